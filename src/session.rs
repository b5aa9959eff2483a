use crate::downloader;
use crate::error::{Error, Result};
use crate::loader::{CompoundInput, Limits, UploadedFile, normalize};
use crate::predictor::{DEFAULT_PERCENTAGE, PredictionClient, PredictionRequest, validate_percentage};
use crate::results::ShapedResults;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What the last submission produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Shaped(ShapedResults),
    /// Service or transport failure, as shown to the user
    Failed(String),
}

/// Input and result state of one user
#[derive(Debug, Clone)]
pub struct SessionState {
    pub text: String,
    pub file: Option<UploadedFile>,
    pub percentage: u8,
    pub outcome: Option<Outcome>,
    pub input_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            text: String::new(),
            file: None,
            percentage: DEFAULT_PERCENTAGE,
            outcome: None,
            input_error: None,
        }
    }
}

/// One user's prediction workflow
///
/// At most one submission is in flight; a second `submit` while the first is
/// pending fails with `Error::Busy`. A finished submission replaces whatever
/// the previous one left behind.
pub struct Session {
    state: Mutex<SessionState>,
    busy: AtomicBool,
    limits: Limits,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Session {
    pub fn new(limits: Limits) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            busy: AtomicBool::new(false),
            limits,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionState {
        self.state().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Replace the free-text input; any selected file is dropped
    pub fn set_text(&self, text: impl Into<String>) {
        let mut state = self.state();
        state.text = text.into();
        state.file = None;
        state.input_error = None;
        state.outcome = None;
    }

    /// Select a file as input, replacing the free text
    ///
    /// Files that are not CSV, XLS or XLSX are refused and leave no file
    /// selected.
    pub fn select_file(&self, file: UploadedFile) -> Result<()> {
        let mut state = self.state();
        if let Err(e) = file.kind() {
            state.file = None;
            state.input_error = Some(e.to_string());
            return Err(e);
        }

        state.file = Some(file);
        state.text.clear();
        state.input_error = None;
        state.outcome = None;
        Ok(())
    }

    pub fn set_percentage(&self, percentage: u8) -> Result<()> {
        self.state().percentage = validate_percentage(percentage)?;
        Ok(())
    }

    /// Reset inputs and results; the percentage is kept
    pub fn clear(&self) {
        let mut state = self.state();
        let percentage = state.percentage;
        *state = SessionState {
            percentage,
            ..SessionState::default()
        };
    }

    /// Normalize the current input, ask the service, and shape the answer
    ///
    /// Input errors are stored as the session's input error; service errors
    /// as a failed outcome. Either way the session stays usable.
    pub async fn submit(&self, client: &dyn PredictionClient) -> Result<ShapedResults> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(Error::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        let (text, file, percentage) = {
            let mut state = self.state();
            state.outcome = None;
            state.input_error = None;
            (state.text.clone(), state.file.clone(), state.percentage)
        };

        let input = match &file {
            Some(file) => CompoundInput::File(file),
            None => CompoundInput::Text(&text),
        };
        let request = match normalize(input, &self.limits)
            .and_then(|compounds| PredictionRequest::new(compounds, percentage))
        {
            Ok(request) => request,
            Err(e) => {
                self.state().input_error = Some(e.to_string());
                return Err(e);
            }
        };

        info!("Submitting {} compounds", request.compound.len());
        match client.predict(&request).await {
            Ok(response) => {
                let shaped = ShapedResults::from_response(&response);
                self.state().outcome = Some(Outcome::Shaped(shaped.clone()));
                Ok(shaped)
            }
            Err(e) => {
                self.state().outcome = Some(Outcome::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// CSV of the current results table, if there is one
    pub fn export_csv(&self) -> Result<Option<String>> {
        match &self.state().outcome {
            Some(Outcome::Shaped(shaped)) if !shaped.rows.is_empty() => {
                downloader::to_csv(shaped).map(Some)
            }
            _ => Ok(None),
        }
    }
}
