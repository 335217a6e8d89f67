use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Color32};
use screenrec_capture_engine::backend::CpalMicrophoneBackend;
use screenrec_capture_engine::{
    list_active_microphones, CaptureSession, MicrophoneInfo, ScreenOutcome, SessionConfig,
    SessionSummary, VideoFormat,
};
use screenrec_common::clock::{format_elapsed, RecordingClock};
use screenrec_common::config::AppConfig;
use screenrec_mux_engine::{save_recording, FfmpegMuxer, SaveOutcome, SaveRequest};

mod save_dialog;

use save_dialog::{DialogAction, PendingRecording, SaveDialog};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();
    screenrec_common::logging::init_logging(&config.logging);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Screen Recorder")
            .with_always_on_top()
            .with_inner_size([420.0, 300.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Screen Recorder",
        options,
        Box::new(move |cc| Box::new(RecorderApp::new(runtime, config, cc.egui_ctx.clone()))),
    )
    .map_err(|e| anyhow::anyhow!("recorder launch failed: {e}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Ready,
    Countdown(u32),
    Recording,
    Stopping,
    Saving,
}

#[derive(Debug)]
enum UiMessage {
    Microphones(Vec<MicrophoneInfo>),
    Countdown(u32),
    Started { clock: Option<RecordingClock> },
    StartFailed { error: String },
    Stopped { summary: Box<SessionSummary> },
    StopFailed { error: String },
    Saved { outcome: SaveOutcome },
    SaveFailed { error: String },
}

struct RecorderApp {
    runtime: tokio::runtime::Runtime,
    session: Arc<tokio::sync::Mutex<CaptureSession>>,
    config: AppConfig,
    stage: Stage,
    selected_format: Option<VideoFormat>,
    clock: Option<RecordingClock>,
    status: String,
    warning: Option<String>,
    microphones: Option<Vec<MicrophoneInfo>>,
    save_dialog: Option<SaveDialog>,
    pending: Option<PendingRecording>,
    sender: Sender<UiMessage>,
    receiver: Receiver<UiMessage>,
    egui_ctx: egui::Context,
}

impl RecorderApp {
    fn new(runtime: tokio::runtime::Runtime, config: AppConfig, egui_ctx: egui::Context) -> Self {
        let (sender, receiver) = mpsc::channel();
        let session = CaptureSession::new(SessionConfig::from(&config.recording));

        let app = Self {
            runtime,
            session: Arc::new(tokio::sync::Mutex::new(session)),
            config,
            stage: Stage::Ready,
            selected_format: None,
            clock: None,
            status: "Ready".to_string(),
            warning: None,
            microphones: None,
            save_dialog: None,
            pending: None,
            sender,
            receiver,
            egui_ctx,
        };
        app.refresh_microphones();
        app
    }

    fn send(&self) -> impl Fn(UiMessage) + Send + 'static {
        let sender = self.sender.clone();
        let ctx = self.egui_ctx.clone();
        move |message| {
            let _ = sender.send(message);
            ctx.request_repaint();
        }
    }

    fn refresh_microphones(&self) {
        let send = self.send();
        let spec = SessionConfig::from(&self.config.recording).audio;
        self.runtime.spawn_blocking(move || {
            let microphones = list_active_microphones(&CpalMicrophoneBackend::new(), &spec);
            send(UiMessage::Microphones(microphones));
        });
    }

    fn start_recording(&mut self) {
        if self.stage != Stage::Ready {
            self.warn("Recording is already in progress");
            return;
        }
        let Some(format) = self.selected_format else {
            self.warn("Please select a video format");
            return;
        };

        self.warning = None;
        if self.pending.take().is_some() {
            tracing::info!("Discarding unsaved temporaries of the previous recording");
        }
        let countdown_secs = self.config.recording.countdown_secs;
        self.stage = Stage::Countdown(countdown_secs);
        self.status = format!("Starting {format} recording...");

        let session = self.session.clone();
        let send = self.send();
        self.runtime.spawn(async move {
            for n in (1..=countdown_secs).rev() {
                send(UiMessage::Countdown(n));
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            send(UiMessage::Countdown(0));

            let mut session = session.lock().await;
            match session.start(format).await {
                Ok(()) => send(UiMessage::Started {
                    clock: session.clock().cloned(),
                }),
                Err(err) => send(UiMessage::StartFailed {
                    error: err.to_string(),
                }),
            }
        });
    }

    fn stop_recording(&mut self) {
        if self.stage != Stage::Recording {
            self.warn("Recording has not started yet");
            return;
        }

        self.stage = Stage::Stopping;
        self.status = "Stopping...".to_string();
        let session = self.session.clone();
        let send = self.send();
        self.runtime.spawn(async move {
            match session.lock().await.stop().await {
                Ok(summary) => send(UiMessage::Stopped {
                    summary: Box::new(summary),
                }),
                Err(err) => send(UiMessage::StopFailed {
                    error: err.to_string(),
                }),
            }
        });
    }

    fn save(&mut self, request: SaveRequest) {
        self.stage = Stage::Saving;
        self.status = "Saving...".to_string();
        let encoder = self.config.encoder.clone();
        let send = self.send();
        self.runtime.spawn_blocking(move || {
            let muxer = FfmpegMuxer::from_config(&encoder);
            match save_recording(&request, &muxer) {
                Ok(outcome) => send(UiMessage::Saved { outcome }),
                Err(err) => send(UiMessage::SaveFailed {
                    error: err.to_string(),
                }),
            }
        });
    }

    fn warn(&mut self, message: &str) {
        tracing::warn!("{message}");
        self.warning = Some(message.to_string());
    }

    fn poll_messages(&mut self) {
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                UiMessage::Microphones(microphones) => {
                    if microphones.is_empty() {
                        tracing::warn!("No available microphones found");
                    }
                    self.microphones = Some(microphones);
                }
                UiMessage::Countdown(n) => {
                    if matches!(self.stage, Stage::Countdown(_)) {
                        self.stage = Stage::Countdown(n);
                    }
                }
                UiMessage::Started { clock } => {
                    self.clock = clock;
                    self.stage = Stage::Recording;
                    self.status = "Recording".to_string();
                }
                UiMessage::StartFailed { error } => {
                    self.stage = Stage::Ready;
                    self.status = "Ready".to_string();
                    self.warn(&format!("Failed to start: {error}"));
                }
                UiMessage::Stopped { summary } => self.on_stopped(*summary),
                UiMessage::StopFailed { error } => {
                    self.stage = Stage::Ready;
                    self.clock = None;
                    self.warn(&format!("Failed to stop: {error}"));
                }
                UiMessage::Saved { outcome } => {
                    self.stage = Stage::Ready;
                    self.save_dialog = None;
                    let paths: Vec<String> = outcome
                        .paths()
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect();
                    self.status = format!("Saved {}", paths.join(" and "));
                    if matches!(outcome, SaveOutcome::VideoOnly { .. }) {
                        self.warning = Some("No audio was recorded; saved video only".to_string());
                    }
                }
                UiMessage::SaveFailed { error } => {
                    self.stage = Stage::Ready;
                    tracing::error!(%error, "Save failed");
                    if let Some(dialog) = self.save_dialog.as_mut() {
                        dialog.set_error(format!("Save failed: {error}"));
                    } else {
                        self.warn(&format!("Save failed: {error}"));
                    }
                }
            }
        }
    }

    fn on_stopped(&mut self, summary: SessionSummary) {
        self.stage = Stage::Ready;
        self.clock = None;
        self.status = summary.describe();

        if let ScreenOutcome::Failed { message } = &summary.screen {
            self.warn(&format!("Screen capture failed: {message}"));
        }
        if !summary.temp_files.video_exists() {
            return;
        }

        self.open_save_dialog(PendingRecording {
            format: summary.format,
            work_dir: self.config.recording.work_dir.clone(),
        });
    }

    fn open_save_dialog(&mut self, recording: PendingRecording) {
        let directory = std::env::current_dir()
            .unwrap_or_else(|_| self.config.recording.work_dir.clone());
        self.save_dialog = Some(recording.dialog(&directory));
    }

    fn save_last_recording(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.is_available() {
            self.warning = None;
            self.open_save_dialog(pending);
        } else {
            self.warn("The last recording is no longer available");
        }
    }

    fn cancel_save(&mut self) {
        if let Some(dialog) = self.save_dialog.take() {
            tracing::info!(format = %dialog.format(), "Save cancelled; temporaries kept");
            self.status = format!(
                "Save cancelled; temporary files kept in {}",
                self.config.recording.work_dir.display()
            );
            self.pending = Some(PendingRecording {
                format: dialog.format(),
                work_dir: self.config.recording.work_dir.clone(),
            });
        }
    }

    fn microphone_label(&self) -> String {
        match &self.microphones {
            None => "Microphone: checking...".to_string(),
            Some(mics) => match mics.first() {
                Some(mic) => format!("Microphone: {}", mic.name),
                None => "Microphone: none (recording without sound)".to_string(),
            },
        }
    }
}

impl eframe::App for RecorderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_messages();
        if matches!(self.stage, Stage::Recording | Stage::Countdown(_)) {
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        if let Some(dialog) = self.save_dialog.as_mut() {
            if self.stage != Stage::Saving {
                match dialog.show(ctx) {
                    Some(DialogAction::Save(request)) => self.save(request),
                    Some(DialogAction::Cancel) => self.cancel_save(),
                    None => {}
                }
            }
        }

        if let Stage::Countdown(n) = self.stage {
            if n > 0 {
                egui::Area::new(egui::Id::new("countdown"))
                    .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                    .order(egui::Order::Foreground)
                    .show(ctx, |ui| {
                        ui.label(
                            egui::RichText::new(n.to_string())
                                .size(96.0)
                                .strong()
                                .color(Color32::from_rgb(255, 120, 120)),
                        );
                    });
            }
        }

        let controls_enabled = self.save_dialog.is_none();
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(controls_enabled, |ui| {
                ui.heading("Screen Recorder");
                ui.separator();

                ui.horizontal(|ui| {
                    ui.label("Format");
                    let locked = self.stage != Stage::Ready;
                    for format in VideoFormat::ALL {
                        let selected = self.selected_format == Some(format);
                        let radio = ui.add_enabled(
                            !locked,
                            egui::RadioButton::new(selected, format.extension()),
                        );
                        if radio.clicked() {
                            self.selected_format = Some(format);
                        }
                    }
                });
                ui.label(self.microphone_label());

                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    let start = egui::Button::new("Start")
                        .fill(Color32::from_rgb(200, 52, 52))
                        .stroke(egui::Stroke::new(1.0, Color32::from_rgb(230, 120, 120)));
                    if ui.add(start).clicked() {
                        self.start_recording();
                    }

                    let stop = egui::Button::new("Stop")
                        .fill(Color32::from_rgb(60, 72, 88))
                        .stroke(egui::Stroke::new(1.0, Color32::from_rgb(110, 130, 160)));
                    if ui.add(stop).clicked() {
                        self.stop_recording();
                    }

                    if let Some(clock) = self.clock.as_ref() {
                        ui.colored_label(
                            Color32::from_rgb(255, 120, 120),
                            format!("REC {}", format_elapsed(clock.elapsed_whole_secs())),
                        );
                    }
                });

                if self.stage == Stage::Ready && self.pending.is_some() {
                    ui.add_space(4.0);
                    if ui.button("Save last recording").clicked() {
                        self.save_last_recording();
                    }
                }

                ui.add_space(6.0);
                ui.label(format!("Status: {}", self.status));
                if let Some(warning) = &self.warning {
                    ui.colored_label(Color32::from_rgb(240, 180, 60), warning.as_str());
                }
            });
        });
    }
}

impl Drop for RecorderApp {
    fn drop(&mut self) {
        if self.stage == Stage::Recording {
            // Finalize the temporaries before the runtime goes away.
            let session = self.session.clone();
            if let Err(err) = self
                .runtime
                .block_on(async move { session.lock().await.stop().await })
            {
                tracing::warn!(error = %err, "Failed to stop recording on exit");
            }
        }
    }
}
