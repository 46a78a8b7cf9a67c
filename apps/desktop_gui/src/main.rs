//! Doodle NFT desktop client: draw a doodle, mint it from the fixed
//! collection contract, and watch the mint land on the marketplace.

mod backend_bridge;
mod controller;
mod settings;
mod ui;

use chrono::{DateTime, Utc};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use eframe::egui;
use mint_flow::{ConnectionPhase, MintFlowSnapshot};
use shared::domain::{Address, TokenId};

use backend_bridge::commands::BackendCommand;
use controller::events::{err_label, UiEvent};
use controller::orchestration::dispatch_backend_command;
use settings::VariantSettings;
use ui::canvas::DoodleCanvas;

const COMMAND_QUEUE_CAPACITY: usize = 64;
const UI_EVENT_QUEUE_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
struct Args {
    /// Wallet/node JSON-RPC endpoint; overrides file and env settings.
    #[arg(long)]
    rpc_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlSet {
    NotConnected,
    MintControls,
    MintingInProgress,
}

fn control_set(snapshot: &MintFlowSnapshot) -> ControlSet {
    match snapshot.phase {
        ConnectionPhase::Disconnected => ControlSet::NotConnected,
        ConnectionPhase::Idle => ControlSet::MintControls,
        ConnectionPhase::Minting => ControlSet::MintingInProgress,
    }
}

fn remaining_label(total_supply: u64, minted: Option<u64>) -> String {
    match minted {
        Some(minted) => format!(
            "{} of {} doodles remaining",
            total_supply.saturating_sub(minted),
            total_supply
        ),
        None => "Supply not loaded yet".to_string(),
    }
}

fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

struct MintNotice {
    minter: Address,
    token_id: TokenId,
    marketplace_url: String,
    observed_at: DateTime<Utc>,
}

fn notification_text(notice: &MintNotice) -> String {
    format!(
        "Minted token #{} to {}. It can take a few minutes to show up on the marketplace: {}",
        notice.token_id,
        short_address(&notice.minter),
        notice.marketplace_url
    )
}

struct DoodleMintApp {
    settings: VariantSettings,
    collection_url: String,
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    snapshot: MintFlowSnapshot,
    backend_ready: bool,
    status: String,
    error_banner: Option<String>,
    notification: Option<MintNotice>,
    canvas: DoodleCanvas,
    captured_doodle: Option<String>,
}

impl DoodleMintApp {
    fn new(
        settings: VariantSettings,
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
    ) -> Self {
        let collection_url = format!(
            "{}/{}",
            settings.marketplace_base_url.trim_end_matches('/'),
            settings.collection_slug
        );
        Self {
            settings,
            collection_url,
            cmd_tx,
            ui_rx,
            snapshot: MintFlowSnapshot {
                phase: ConnectionPhase::Disconnected,
                account: None,
                minted_count: None,
            },
            backend_ready: false,
            status: "Starting backend worker...".to_string(),
            error_banner: None,
            notification: None,
            canvas: DoodleCanvas::default(),
            captured_doodle: None,
        }
    }

    fn drain_backend_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::BackendReady => {
                self.backend_ready = true;
                self.status = "Backend worker ready".to_string();
            }
            UiEvent::Snapshot(snapshot) => {
                self.snapshot = snapshot;
            }
            UiEvent::CountUpdated { minted } => {
                self.snapshot.minted_count = Some(minted);
            }
            UiEvent::MintSubmitted { tx_hash } => {
                self.status = format!("Minting... transaction {tx_hash} submitted");
            }
            UiEvent::MintConfirmed {
                tx_hash: _,
                explorer_url,
            } => {
                self.status = format!("Mint confirmed: {explorer_url}");
                self.error_banner = None;
            }
            UiEvent::MintObserved {
                minter,
                token_id,
                marketplace_url,
                observed_at,
            } => {
                self.notification = Some(MintNotice {
                    minter,
                    token_id,
                    marketplace_url,
                    observed_at,
                });
            }
            UiEvent::Info(message) => {
                self.status = message;
            }
            UiEvent::Error(err) => {
                self.error_banner =
                    Some(format!("{}: {}", err_label(err.category()), err.message()));
            }
        }
    }

    fn dispatch(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            ui.vertical_centered(|ui| {
                ui.heading(egui::RichText::new("Doodle NFT Collection").size(28.0));
                ui.label("Doodle. Mint. Profit.");
                ui.add_space(4.0);
                if ui.button("View Collection on OpenSea").clicked() {
                    ctx.open_url(egui::OpenUrl::new_tab(self.collection_url.clone()));
                }
            });
            ui.add_space(8.0);
        });
    }

    fn render_footer(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                match &self.snapshot.account {
                    Some(account) => ui.label(format!("Connected: {}", short_address(account))),
                    None => ui.label("Not connected"),
                };
                ui.separator();
                ui.label(&self.status);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.hyperlink_to(
                        format!("built by @{}", self.settings.creator_handle),
                        self.settings.creator_link(),
                    );
                });
            });
            ui.add_space(4.0);
        });
    }

    fn render_mint_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Erase").clicked() {
                self.canvas.erase_all();
            }
            if ui.button("Undo").clicked() {
                self.canvas.undo_stroke();
            }
            if ui.button("Done").clicked() {
                if self.canvas.is_empty() {
                    self.error_banner = Some("Input: draw something before pressing Done".into());
                } else {
                    match self.canvas.export_png_data_url() {
                        Ok(data_url) => {
                            tracing::debug!(bytes = data_url.len(), "captured doodle");
                            // Overwrites any previous capture, never cleared.
                            self.captured_doodle = Some(data_url);
                            self.status = "Doodle captured".to_string();
                        }
                        Err(err) => {
                            self.error_banner = Some(format!("Input: {err:#}"));
                        }
                    }
                }
            }
            if ui.button("Save as PNG...").clicked() {
                self.save_doodle();
            }
            match &self.captured_doodle {
                Some(_) => ui.label("Doodle captured ✓"),
                None => ui.label("Press Done to capture your doodle"),
            };
        });

        self.canvas.ui(ui);
        ui.add_space(8.0);

        if ui
            .button(egui::RichText::new("Mint NFT").size(18.0))
            .clicked()
        {
            match self.captured_doodle.clone() {
                Some(doodle) => {
                    self.error_banner = None;
                    self.dispatch(BackendCommand::Mint {
                        doodle: Some(doodle),
                    });
                }
                None => {
                    self.error_banner =
                        Some("Input: please click Done before minting".to_string());
                }
            }
        }
    }

    fn save_doodle(&mut self) {
        let png = match self.canvas.export_png() {
            Ok(png) => png,
            Err(err) => {
                self.error_banner = Some(format!("Input: {err:#}"));
                return;
            }
        };
        let Some(path) = rfd::FileDialog::new()
            .set_file_name("doodle.png")
            .save_file()
        else {
            return;
        };
        match std::fs::write(&path, png) {
            Ok(()) => self.status = format!("Saved doodle to {}", path.display()),
            Err(err) => self.error_banner = Some(format!("Unexpected: failed to save: {err}")),
        }
    }

    fn render_notification(&mut self, ctx: &egui::Context) {
        let Some(notice) = &self.notification else {
            return;
        };
        let text = notification_text(notice);
        let marketplace_url = notice.marketplace_url.clone();
        let observed_at = notice.observed_at;
        let mut dismiss = false;

        egui::Window::new("Your NFT is on its way!")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(text);
                ui.label(format!("Observed at {}", observed_at.format("%H:%M:%S UTC")));
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Open on marketplace").clicked() {
                        ctx.open_url(egui::OpenUrl::new_tab(marketplace_url.clone()));
                    }
                    if ui.button("Copy link").clicked() {
                        match arboard::Clipboard::new()
                            .and_then(|mut clipboard| clipboard.set_text(marketplace_url.clone()))
                        {
                            Ok(()) => self.status = "Link copied".to_string(),
                            Err(err) => {
                                self.error_banner =
                                    Some(format!("Unexpected: clipboard failed: {err}"));
                            }
                        }
                    }
                    if ui.button("Dismiss").clicked() {
                        dismiss = true;
                    }
                });
            });

        if dismiss {
            self.notification = None;
        }
    }
}

impl eframe::App for DoodleMintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_backend_events();

        self.render_header(ctx);
        self.render_footer(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(8.0);
            if let Some(banner) = &self.error_banner {
                ui.colored_label(egui::Color32::from_rgb(0xcc, 0x33, 0x33), banner);
                ui.add_space(4.0);
            }
            ui.horizontal(|ui| {
                ui.label(remaining_label(
                    self.settings.total_supply,
                    self.snapshot.minted_count,
                ));
                if ui.small_button("↻").on_hover_text("Refresh count").clicked() {
                    self.dispatch(BackendCommand::RefreshCount);
                }
            });
            ui.add_space(8.0);

            match control_set(&self.snapshot) {
                ControlSet::NotConnected => {
                    let connect =
                        ui.add_enabled(self.backend_ready, egui::Button::new("Connect Wallet"));
                    if connect.clicked() {
                        self.error_banner = None;
                        self.dispatch(BackendCommand::Connect);
                    }
                }
                ControlSet::MintControls => self.render_mint_controls(ui),
                ControlSet::MintingInProgress => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Minting in progress...");
                    });
                }
            }
        });

        self.render_notification(ctx);

        // Backend events arrive on their own thread; keep polling for them.
        ctx.request_repaint_after(std::time::Duration::from_millis(200));
    }
}

impl Drop for DoodleMintApp {
    fn drop(&mut self) {
        let _ = self.cmd_tx.try_send(BackendCommand::Shutdown);
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = settings::load_settings();
    if let Some(rpc_url) = args.rpc_url {
        settings.rpc_url = rpc_url;
    }
    if let Err(err) = settings.mint_flow_config(true) {
        eprintln!("invalid settings: {err:#}");
        std::process::exit(2);
    }

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(COMMAND_QUEUE_CAPACITY);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(UI_EVENT_QUEUE_CAPACITY);
    backend_bridge::runtime::launch(settings.clone(), cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Doodle NFT Collection")
            .with_inner_size([900.0, 720.0])
            .with_min_inner_size([720.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Doodle NFT Collection",
        options,
        Box::new(move |_cc| Ok(Box::new(DoodleMintApp::new(settings, cmd_tx, ui_rx)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(phase: ConnectionPhase, minted: Option<u64>) -> MintFlowSnapshot {
        MintFlowSnapshot {
            phase,
            account: None,
            minted_count: minted,
        }
    }

    #[test]
    fn minting_phase_renders_the_progress_view_instead_of_the_mint_button() {
        assert_eq!(
            control_set(&snapshot(ConnectionPhase::Minting, Some(1))),
            ControlSet::MintingInProgress
        );
        assert_eq!(
            control_set(&snapshot(ConnectionPhase::Idle, Some(1))),
            ControlSet::MintControls
        );
        assert_eq!(
            control_set(&snapshot(ConnectionPhase::Disconnected, None)),
            ControlSet::NotConnected
        );
    }

    #[test]
    fn remaining_label_subtracts_minted_from_total() {
        assert_eq!(remaining_label(50, Some(12)), "38 of 50 doodles remaining");
        assert_eq!(remaining_label(50, None), "Supply not loaded yet");
        // Never goes negative even if the contract over-reports.
        assert_eq!(remaining_label(50, Some(60)), "0 of 50 doodles remaining");
    }

    #[test]
    fn notification_mentions_token_id_and_contract_address() {
        let settings = VariantSettings::default();
        let config = settings.mint_flow_config(true).expect("config");
        let notice = MintNotice {
            minter: "0x00000000000000000000000000000000000000cc"
                .parse()
                .expect("minter"),
            token_id: TokenId(7),
            marketplace_url: config.marketplace_item_url(TokenId(7)),
            observed_at: Utc::now(),
        };
        let text = notification_text(&notice);
        assert!(text.contains("#7"), "missing token id: {text}");
        assert!(
            text.contains("0xe606a90181235eca2af8fa1d69e5e1659edc1501"),
            "missing contract address: {text}"
        );
    }

    #[test]
    fn short_address_keeps_prefix_and_suffix() {
        let address: Address = "0xe606a90181235eca2af8fa1d69e5e1659edc1501"
            .parse()
            .expect("address");
        assert_eq!(short_address(&address), "0xe606…1501");
    }
}
