//! Request lifecycle for the single-result modes
//!
//! `idle -> loading -> done | error -> loading ...`. A submit while loading,
//! or with blank input, does nothing.

use tracing::{debug, error};

use crate::error::GatewayError;
use crate::mode::Mode;
use crate::state::{GroundingResult, GroundingSource, RequestStatus};

/// The one live result of a mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeOutput {
    Text(String),
    Grounded(GroundingResult),
}

impl ModeOutput {
    pub fn text(&self) -> &str {
        match self {
            ModeOutput::Text(text) => text,
            ModeOutput::Grounded(result) => &result.text,
        }
    }

    pub fn sources(&self) -> &[GroundingSource] {
        match self {
            ModeOutput::Text(_) => &[],
            ModeOutput::Grounded(result) => &result.sources,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModeController {
    mode: Mode,
    status: RequestStatus,
    output: Option<ModeOutput>,
}

impl ModeController {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            status: RequestStatus::Idle,
            output: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == RequestStatus::Loading
    }

    pub fn output(&self) -> Option<&ModeOutput> {
        self.output.as_ref()
    }

    /// Enter `loading` for a user submit. Returns false (and changes nothing)
    /// when a request is already in flight or the input is blank.
    pub fn begin(&mut self, input: &str) -> bool {
        if self.is_loading() || input.trim().is_empty() {
            return false;
        }

        debug!(mode = self.mode.as_str(), "Request started");
        self.status = RequestStatus::Loading;
        self.output = None;
        true
    }

    /// Settle the in-flight request. Faults are logged and replaced by the
    /// mode's fixed message; they never propagate past here.
    pub fn complete(&mut self, result: Result<ModeOutput, GatewayError>) {
        if !self.is_loading() {
            debug!(mode = self.mode.as_str(), "Ignoring result with no request in flight");
            return;
        }

        match result {
            Ok(output) => {
                debug!(mode = self.mode.as_str(), "Request finished");
                self.status = RequestStatus::Done;
                self.output = Some(output);
            }
            Err(e) => {
                error!(mode = self.mode.as_str(), error = %e, "Gateway request failed");
                self.status = RequestStatus::Error;
                self.output = Some(ModeOutput::Text(self.mode.error_message().to_string()));
            }
        }
    }
}
