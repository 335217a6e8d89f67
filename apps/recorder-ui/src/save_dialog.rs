use std::path::{Path, PathBuf};

use eframe::egui;
use screenrec_capture_engine::{TempFiles, VideoFormat};
use screenrec_mux_engine::{separate_output_paths, with_format_extension, SaveRequest};

/// Suggested name; differs from the `recording.<ext>` temporary.
const DEFAULT_FILE_STEM: &str = "screen_recording";

/// What the user did with the save dialog this frame.
#[derive(Debug)]
pub enum DialogAction {
    Save(SaveRequest),
    Cancel,
}

/// Modal save-file dialog restricted to the recorded format.
pub struct SaveDialog {
    format: VideoFormat,
    work_dir: PathBuf,
    directory: String,
    file_name: String,
    combine: bool,
    error: Option<String>,
}

impl SaveDialog {
    pub fn new(format: VideoFormat, work_dir: PathBuf, directory: &Path) -> Self {
        Self {
            format,
            work_dir,
            directory: directory.display().to_string(),
            file_name: format!("{DEFAULT_FILE_STEM}.{}", format.extension()),
            combine: true,
            error: None,
        }
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    /// Show a save failure inside the dialog so the user can retry.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Destination with the format extension enforced.
    pub fn target_path(&self) -> Option<PathBuf> {
        let name = self.file_name.trim();
        if name.is_empty() {
            return None;
        }
        let directory = self.directory.trim();
        let path = if directory.is_empty() {
            PathBuf::from(name)
        } else {
            Path::new(directory).join(name)
        };
        Some(with_format_extension(&path, self.format))
    }

    pub fn request(&self) -> Option<SaveRequest> {
        Some(SaveRequest {
            save_path: self.target_path()?,
            format: self.format,
            combine: self.combine,
            work_dir: self.work_dir.clone(),
        })
    }

    pub fn show(&mut self, ctx: &egui::Context) -> Option<DialogAction> {
        let mut action = None;
        egui::Window::new("Save recording")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                egui::Grid::new("save_fields").num_columns(2).show(ui, |ui| {
                    ui.label("Folder");
                    ui.text_edit_singleline(&mut self.directory);
                    ui.end_row();

                    ui.label("File name");
                    ui.text_edit_singleline(&mut self.file_name);
                    ui.end_row();

                    ui.label("Type");
                    ui.label(format!("{} video (*.{})", self.format, self.format.extension()));
                    ui.end_row();
                });

                ui.checkbox(&mut self.combine, "Combine video and audio into one file");

                match self.target_path() {
                    Some(path) if self.combine => {
                        ui.weak(format!("Saves {}", path.display()));
                    }
                    Some(path) => {
                        let (video, audio) = separate_output_paths(&path, self.format);
                        ui.weak(format!("Saves {}", video.display()));
                        ui.weak(format!("and {}", audio.display()));
                    }
                    None => {
                        ui.weak("Enter a file name");
                    }
                }

                if let Some(error) = &self.error {
                    ui.colored_label(egui::Color32::from_rgb(230, 90, 90), error.as_str());
                }

                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    let can_save = self.target_path().is_some();
                    if ui.add_enabled(can_save, egui::Button::new("Save")).clicked() {
                        if let Some(request) = self.request() {
                            action = Some(DialogAction::Save(request));
                        }
                    }
                    if ui.button("Cancel").clicked() {
                        action = Some(DialogAction::Cancel);
                    }
                });
            });
        action
    }
}

/// A recording whose save was cancelled; its temporaries wait in
/// `work_dir` until the next session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecording {
    pub format: VideoFormat,
    pub work_dir: PathBuf,
}

impl PendingRecording {
    /// Whether the temporary video is still on disk.
    pub fn is_available(&self) -> bool {
        TempFiles::new(&self.work_dir, self.format).video_exists()
    }

    /// A fresh save dialog for the kept temporaries.
    pub fn dialog(&self, directory: &Path) -> SaveDialog {
        SaveDialog::new(self.format, self.work_dir.clone(), directory)
    }
}
