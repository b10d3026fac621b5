//! Gateway — the main event loop connecting channels, the provider, the
//! Notion task store and the reminder scheduler.
//!
//! Messages from the same sender are handled strictly in order; while a
//! provider call is in flight further messages from that sender are
//! buffered and drained afterwards.

mod ordinals;
mod pipeline;

use recado_core::{
    config::{Config, SchedulerConfig},
    message::{IncomingMessage, OutgoingMessage},
    traits::{Channel, Provider, TaskStore},
};
use recado_memory::Store;
use recado_notion::NotionStore;
use recado_resolver::TaskResolver;
use recado_scheduler::ReminderScheduler;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use pipeline::Pending;

/// The central gateway that routes messages between channels, the provider
/// and the task store.
pub struct Gateway {
    pub(super) provider: Arc<dyn Provider>,
    pub(super) channels: HashMap<String, Arc<dyn Channel>>,
    pub(super) store: Arc<dyn TaskStore>,
    pub(super) resolver: TaskResolver,
    pub(super) scheduler: ReminderScheduler,
    pub(super) scheduler_config: SchedulerConfig,
    pub(super) tz: chrono_tz::Tz,
    pub(super) assistant_name: String,
    pub(super) uptime: Instant,
    /// Tracks senders with active provider calls. New messages are buffered here.
    pub(super) active_senders: Mutex<HashMap<String, Vec<IncomingMessage>>>,
    /// Confirmations waiting for a yes/no per sender.
    pub(super) pending: Mutex<HashMap<String, Pending>>,
}

impl Gateway {
    /// Create a new gateway from loaded configuration.
    pub fn new(
        provider: Arc<dyn Provider>,
        channels: HashMap<String, Arc<dyn Channel>>,
        memory: Store,
        cfg: &Config,
    ) -> anyhow::Result<Arc<Self>> {
        let tz = cfg.time.tz()?;
        let store: Arc<dyn TaskStore> = Arc::new(NotionStore::from_config(&cfg.notion));
        let resolver = TaskResolver::new(store.clone(), memory.clone());
        let scheduler = ReminderScheduler::new(memory, tz);
        Ok(Arc::new(Self {
            provider,
            channels,
            store,
            resolver,
            scheduler,
            scheduler_config: cfg.scheduler.clone(),
            tz,
            assistant_name: cfg.recado.name.clone(),
            uptime: Instant::now(),
            active_senders: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }))
    }

    /// Run the main event loop.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "{} gateway running | provider: {} | channels: {} | scheduler: {}",
            self.assistant_name,
            self.provider.name(),
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
            if self.scheduler_config.enabled {
                "enabled"
            } else {
                "disabled"
            },
        );

        let (tx, mut rx) = mpsc::channel::<IncomingMessage>(256);

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(msg) = channel_rx.recv().await {
                    if tx.send(msg).await.is_err() {
                        info!("gateway receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            });

            info!("Channel started: {name}");
        }

        drop(tx);

        // Reminder delivery runs on its own loop, off the message path.
        let sched_handle = if self.scheduler_config.enabled {
            let scheduler = self.scheduler.clone();
            let poll_secs = self.scheduler_config.poll_interval_secs;
            self.channels.values().next().cloned().map(|channel| {
                tokio::spawn(async move {
                    scheduler.run(channel, poll_secs).await;
                })
            })
        } else {
            None
        };

        // Main event loop with graceful shutdown.
        loop {
            tokio::select! {
                Some(incoming) = rx.recv() => {
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.dispatch_message(incoming).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(&sched_handle).await;
        Ok(())
    }

    /// Dispatch a message: buffer if sender is busy, otherwise process.
    async fn dispatch_message(self: Arc<Self>, incoming: IncomingMessage) {
        let sender_key = format!("{}:{}", incoming.channel, incoming.sender_id);

        {
            let mut active = self.active_senders.lock().await;
            if let Some(buffer) = active.get_mut(&sender_key) {
                // Sender already has an active call — buffer this message.
                buffer.push(incoming.clone());
                info!(
                    "buffered message from {} (active call in progress)",
                    sender_key
                );
                self.send_text(&incoming, "Un momento, termino lo anterior y sigo contigo.")
                    .await;
                return;
            }
            // Mark sender as active (empty buffer).
            active.insert(sender_key.clone(), Vec::new());
        }

        // Process the message.
        self.handle_isolated(incoming).await;

        // Drain any buffered messages for this sender.
        loop {
            let next = {
                let mut active = self.active_senders.lock().await;
                match active.get_mut(&sender_key) {
                    Some(buf) if !buf.is_empty() => Some(buf.remove(0)),
                    _ => {
                        // No more buffered messages — remove sender from active.
                        active.remove(&sender_key);
                        None
                    }
                }
            };

            match next {
                Some(buffered_msg) => {
                    info!("processing buffered message from {}", sender_key);
                    self.handle_isolated(buffered_msg).await;
                }
                None => break,
            }
        }
    }

    /// Run the handler on its own task so a panic inside it cannot skip the
    /// drain loop above; the sender must always leave `active_senders`.
    async fn handle_isolated(self: &Arc<Self>, incoming: IncomingMessage) {
        let gw = self.clone();
        let sender_id = incoming.sender_id.clone();
        if let Err(e) = tokio::spawn(async move { gw.handle_message(incoming).await }).await {
            error!("message handler for {sender_id} aborted: {e}");
        }
    }

    /// Send a reply back through the channel the message arrived on.
    pub(super) async fn send_text(&self, incoming: &IncomingMessage, text: &str) {
        let Some(channel) = self.channels.get(&incoming.channel) else {
            error!("no channel named {} to reply on", incoming.channel);
            return;
        };
        let Some(ref target) = incoming.reply_target else {
            warn!("message from {} has no reply target", incoming.sender_id);
            return;
        };
        if let Err(e) = channel.send(OutgoingMessage::to(target.clone(), text)).await {
            error!("failed to send reply on {}: {e}", incoming.channel);
        }
    }

    /// Graceful shutdown: stop the scheduler loop and the channels.
    async fn shutdown(&self, sched_handle: &Option<tokio::task::JoinHandle<()>>) {
        info!("Shutting down...");

        if let Some(h) = sched_handle {
            h.abort();
        }

        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("failed to stop channel {name}: {e}");
            }
        }

        info!(
            "Goodbye. Uptime: {}s",
            self.uptime.elapsed().as_secs()
        );
    }
}
