//! Render MATLAB invocation scripts and write them to disk

/// Template rendering and temp file creation for one variable set
pub mod script;
