/*
 * Copyright (C) 2025 The Replicore Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::error::Error;
use std::fmt;

/// Boxed error type used at the platform boundary.
pub type BoxedError = Box<dyn Error + Send + Sync>;

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for MessageError {}

#[derive(Debug)]
struct ContextError {
    context: String,
    source: BoxedError,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.source)
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Creates a boxed error from a plain message.
pub fn new_error(message: impl Into<String>) -> BoxedError {
    Box::new(MessageError(message.into()))
}

/// Wraps an error with additional context, preserving the source chain.
pub fn with_context<E>(error: E, context: impl Into<String>) -> BoxedError
where
    E: Into<BoxedError>,
{
    Box::new(ContextError {
        context: context.into(),
        source: error.into(),
    })
}
