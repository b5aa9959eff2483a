/*!
# PKM2Pred

Batch classification of PKM2 modulators into activators, inhibitors and
decoys, with predicted AC50 ranges for the activators, built in Rust.

## Overview

The classification itself is done by an external prediction service. This
crate covers everything around it: turning what the user typed or uploaded
into a clean list of compounds, sending it to the service, and turning the
answer into something that can be shown and downloaded.

## Architecture

### Ingestion
- **Input Normalizer** (`loader`) - free text split on commas/newlines, or the
  first column of a CSV/XLS/XLSX upload, capped at 20 compounds

### Prediction
- **Prediction client** (`predictor`) - JSON POST to the service, behind the
  `PredictionClient` trait
- **Session** (`session`) - one user's inputs and results, one request in
  flight at a time

### Presentation data
- **Result Shaper** (`results`) - table rows, counts per category, activator
  AC50 range series
- **Export** (`downloader`) - CSV and XLSX downloads of the results table

### Web layer
- axum JSON API (`app`), configured from flags or environment (`config`)
- Page view counter kept in a flat file (`views`)

## REST API Endpoints

- `GET /api/views` - Increments and returns the page view count
- `POST /api/predict` - Predicts compounds given as text
- `POST /api/predict/upload` - Predicts compounds from an uploaded file
- `POST /api/export?format=csv|xlsx` - Downloads a response as a table
*/

pub mod downloader;
pub mod error;
pub mod loader;
pub mod results;
pub mod views;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod predictor;
#[cfg(feature = "web")]
pub mod session;

/// Re-export the main entry points to make them easier to use
pub use downloader::{CSV_HEADERS, to_csv};
pub use error::{Error, Result};
pub use loader::{CompoundInput, FileKind, Limits, UploadedFile, normalize};
pub use results::{
    ActivatorRange, Category, CategoryCounts, DisplayRow, PredictionResponse, ShapedResults,
};
pub use views::ViewCounter;

#[cfg(feature = "web")]
pub use downloader::to_xlsx;
#[cfg(feature = "web")]
pub use predictor::{HttpPredictionClient, PredictionClient, PredictionRequest};
#[cfg(feature = "web")]
pub use session::Session;
