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

//! Shared handler state.

use std::sync::Arc;
use taskline::chat::Dispatcher;
use taskline::stripe::Reconciler;
use taskline::DAL;

#[derive(Clone)]
pub struct AppState {
    pub dal: DAL,
    pub dispatcher: Arc<Dispatcher>,
    pub reconciler: Reconciler,
    /// LINE channel secret for webhook signature verification
    pub line_channel_secret: String,
}
