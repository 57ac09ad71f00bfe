//! Error taxonomy for the evaluation/render pipeline.
//!
//! `EvalError` and `RenderError` are the only failures a user ever sees; both
//! carry a human-readable message and both replace the rendered output rather
//! than crashing the session.

use crate::evaluator::DATA_GLOBAL;

/// The data-construction script failed to run or produced no usable value.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Parse or runtime failure inside the script.
    #[error("{0}")]
    Script(String),

    /// The script ran to completion but never bound the result global.
    #[error("script did not define `{DATA_GLOBAL}`")]
    MissingBinding,
}

impl EvalError {
    pub(crate) fn from_lua(err: mlua::Error) -> Self {
        EvalError::Script(lua_message(&err))
    }
}

/// The template failed to expand against a valid context.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The template text itself is malformed (unclosed tag, bad embedded code).
    #[error("{0}")]
    Compile(String),

    /// Expansion failed at run time (undefined reference, include failure).
    #[error("{0}")]
    Execute(String),
}

impl RenderError {
    /// Classify an engine error: syntax problems are compile errors,
    /// everything else surfaces as an execution failure.
    pub(crate) fn from_lua(err: mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => RenderError::Compile(message),
            other => RenderError::Execute(lua_message(&other)),
        }
    }
}

/// Unwrap engine error wrappers down to the diagnostic a user should read.
fn lua_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => lua_message(cause),
        mlua::Error::WithContext { cause, .. } => lua_message(cause),
        mlua::Error::RuntimeError(msg) => msg.clone(),
        other => other.to_string(),
    }
}
