/*
 *  Copyright 2025 Taskline Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Chat surface: typed commands, the dispatcher, the LINE transport
//! capability, and message payload builders.

pub mod command;
pub mod dispatcher;
pub mod messages;
pub mod transport;

pub use command::ChatCommand;
pub use dispatcher::{DispatchError, Dispatcher, InboundEvent};
pub use transport::{LineProfile, LineTransport, TransportError};
