/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/// Everything that can go wrong while compiling a design. None of these are
/// recoverable: the compilation is aborted and nothing gets written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DesignError {
    /// A block ran out of capacitors, op-amps, comparators or local inputs, or a
    /// module referenced a slot it never claimed.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("already claimed: {0}")]
    AlreadyClaimed(String),
    #[error("already connected: {0}")]
    AlreadyConnected(String),
    #[error("could not route design: {0}")]
    RoutingConflict(String),
    #[error("unrealizable value: {0}")]
    UnrealizableValue(String),
    #[error("memory conflict: {0}")]
    MemoryConflict(String),
    /// Access to a port that does not exist in the current configuration, e.g.
    /// the input of an IO cell in input mode.
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type DesignResult<T> = Result<T, DesignError>;
