//! Command orchestration from UI actions to the backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::PanelCommand;

pub fn dispatch_panel_command(cmd_tx: &Sender<PanelCommand>, cmd: PanelCommand, status: &mut String) {
    let cmd_name = cmd.name();
    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued ui->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "Command queue is full; please retry".to_string();
            tracing::warn!(command = cmd_name, "ui->backend command queue is full");
        }
        Err(TrySendError::Disconnected(_)) => {
            *status = "Backend worker stopped; restart the control panel".to_string();
            tracing::error!(command = cmd_name, "ui->backend command queue disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;

    use super::*;

    #[test]
    fn reports_full_and_disconnected_queues() {
        let (tx, rx) = bounded(1);
        let mut status = String::new();

        dispatch_panel_command(&tx, PanelCommand::Break, &mut status);
        assert!(status.is_empty());
        assert_eq!(rx.try_recv().ok(), Some(PanelCommand::Break));

        dispatch_panel_command(&tx, PanelCommand::StopPlayback, &mut status);
        dispatch_panel_command(&tx, PanelCommand::StopPlayback, &mut status);
        assert!(status.contains("full"));

        drop(rx);
        dispatch_panel_command(&tx, PanelCommand::Break, &mut status);
        assert!(status.contains("stopped"));
    }
}
