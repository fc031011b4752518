use std::cell::RefCell;

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};

use crate::app::{FetchOutcome, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    Quiet,
}

/// Nested terminal progress: one bar over storages, one over the files of
/// the storage currently being downloaded.
pub struct ProgressBars {
    multi: MultiProgress,
    storages: RefCell<Option<ProgressBar>>,
    files: RefCell<Option<ProgressBar>>,
}

impl ProgressBars {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            storages: RefCell::new(None),
            files: RefCell::new(None),
        }
    }

    /// Handle for writers that must not draw over the bars.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }

    fn bar(&self, len: usize, template: &str) -> ProgressBar {
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        self.multi
            .add(ProgressBar::new(len as u64).with_style(style))
    }
}

impl Default for ProgressBars {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBars {
    fn event(&self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::Storages { total } => {
                let bar = self.bar(total, "Processing storages {bar:30} {pos}/{len} {msg}");
                *self.storages.borrow_mut() = Some(bar);
            }
            ProgressEvent::StorageStarted { storage, files } => {
                if let Some(bar) = self.storages.borrow().as_ref() {
                    bar.set_message(storage.name.clone());
                }
                let bar = self.bar(files, "Downloading files {bar:30} {pos}/{len} {msg}");
                *self.files.borrow_mut() = Some(bar);
            }
            ProgressEvent::FileDownloaded { file, bytes } => {
                if let Some(bar) = self.files.borrow().as_ref() {
                    bar.set_message(format!("{} ({})", file.name, HumanBytes(bytes)));
                    bar.inc(1);
                }
            }
            ProgressEvent::StorageFinished { .. } => {
                if let Some(bar) = self.files.borrow_mut().take() {
                    bar.finish_and_clear();
                }
                if let Some(bar) = self.storages.borrow().as_ref() {
                    bar.inc(1);
                }
            }
            ProgressEvent::Extracted { .. } => {}
            ProgressEvent::Finished => {
                if let Some(bar) = self.storages.borrow_mut().take() {
                    bar.finish_with_message("done");
                }
            }
        }
    }
}

pub struct Silent;

impl ProgressSink for Silent {
    fn event(&self, _event: ProgressEvent<'_>) {}
}

pub fn print_fetch_summary(outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::AlreadyPresent => {
            println!("All datasets and runs are already downloaded.");
        }
        FetchOutcome::Downloaded { files, extracted } => {
            println!("Downloaded files: {}", files.len());
            for collection in extracted {
                println!("  {} {}", collection.kind(), collection.name());
            }
        }
    }
}
