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

// This file serves as the entry point for integration tests in this directory.
//
// The tests need a live PostgreSQL instance reachable through DATABASE_URL;
// when the variable is unset each test prints a skip notice and passes.

use ctor::ctor;

// Initialize OpenSSL before any tests run to prevent SIGSEGV on Linux.
// This fixes a known issue with diesel + postgres + connection pooling where
// OpenSSL's atexit handler causes thread-safety issues during cleanup.
// See: https://github.com/diesel-rs/diesel/issues/3441
#[ctor]
fn init_openssl() {
    openssl::init();
}

pub mod fixtures;
pub mod payments;
pub mod rerun_queue;
pub mod users;
