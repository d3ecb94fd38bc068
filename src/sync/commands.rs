//! Routes control-surface actions to commands on the remote core.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adapters::traits::{ControlVerb, RemoteTransport, SeekMode};
use crate::error::{SyncError, SyncResult};
use crate::sync::position::micros_to_seconds;

/// An action raised by the control surface.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlAction {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    /// Relative seek by a signed offset
    Seek { offset_micros: i64 },
    /// Absolute seek, valid only for the track it names
    SetPosition { track_id: String, position_micros: i64 },
    Quit,
    Raise,
}

/// A command ready to send to one zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    Control(ControlVerb),
    Seek { mode: SeekMode, seconds: f64 },
}

impl RemoteCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Control(verb) => verb.as_str(),
            Self::Seek {
                mode: SeekMode::Relative,
                ..
            } => "seek",
            Self::Seek {
                mode: SeekMode::Absolute,
                ..
            } => "set_position",
        }
    }
}

/// Translate a remote-bound action. `projected_track_id` is the track id
/// currently on the surface; an absolute seek naming any other track is
/// stale. Local actions yield `Ok(None)`.
pub fn plan(action: &ControlAction, projected_track_id: &str) -> SyncResult<Option<RemoteCommand>> {
    let command = match action {
        ControlAction::Play => RemoteCommand::Control(ControlVerb::Play),
        ControlAction::Pause => RemoteCommand::Control(ControlVerb::Pause),
        ControlAction::PlayPause => RemoteCommand::Control(ControlVerb::PlayPause),
        ControlAction::Stop => RemoteCommand::Control(ControlVerb::Stop),
        ControlAction::Next => RemoteCommand::Control(ControlVerb::Next),
        ControlAction::Previous => RemoteCommand::Control(ControlVerb::Previous),
        ControlAction::Seek { offset_micros } => RemoteCommand::Seek {
            mode: SeekMode::Relative,
            seconds: micros_to_seconds(*offset_micros),
        },
        ControlAction::SetPosition {
            track_id,
            position_micros,
        } => {
            if track_id != projected_track_id {
                return Err(SyncError::StaleSeekTarget {
                    requested: track_id.clone(),
                    current: projected_track_id.to_string(),
                });
            }
            RemoteCommand::Seek {
                mode: SeekMode::Absolute,
                seconds: micros_to_seconds(*position_micros),
            }
        }
        ControlAction::Quit | ControlAction::Raise => return Ok(None),
    };
    Ok(Some(command))
}

/// Send a command without blocking the caller. The outcome is only logged;
/// failed commands are not retried.
pub fn dispatch(
    transport: Arc<dyn RemoteTransport>,
    zone_id: String,
    command: RemoteCommand,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = match command {
            RemoteCommand::Control(verb) => transport.control(&zone_id, verb).await,
            RemoteCommand::Seek { mode, seconds } => transport.seek(&zone_id, mode, seconds).await,
        };
        match result {
            Ok(()) => debug!(zone_id = %zone_id, "Sent {}", command.name()),
            Err(source) => {
                let err = SyncError::CommandFailed {
                    zone_id,
                    command: command.name().to_string(),
                    source,
                };
                warn!("{}", err);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{RecordingTransport, SentCommand};

    const TRACK: &str = "/com/roon/mpris/zone_7a31";

    #[test]
    fn test_transport_verbs_map_one_to_one() {
        let cases = [
            (ControlAction::Play, ControlVerb::Play),
            (ControlAction::Pause, ControlVerb::Pause),
            (ControlAction::PlayPause, ControlVerb::PlayPause),
            (ControlAction::Stop, ControlVerb::Stop),
            (ControlAction::Next, ControlVerb::Next),
            (ControlAction::Previous, ControlVerb::Previous),
        ];
        for (action, verb) in cases {
            assert_eq!(
                plan(&action, TRACK).unwrap(),
                Some(RemoteCommand::Control(verb))
            );
        }
    }

    #[test]
    fn test_relative_seek_converts_to_seconds() {
        let cmd = plan(&ControlAction::Seek { offset_micros: -5_500_000 }, TRACK).unwrap();
        assert_eq!(
            cmd,
            Some(RemoteCommand::Seek {
                mode: SeekMode::Relative,
                seconds: -5.5
            })
        );
    }

    #[test]
    fn test_set_position_requires_current_track() {
        let current = ControlAction::SetPosition {
            track_id: TRACK.to_string(),
            position_micros: 30_000_000,
        };
        assert_eq!(
            plan(&current, TRACK).unwrap(),
            Some(RemoteCommand::Seek {
                mode: SeekMode::Absolute,
                seconds: 30.0
            })
        );

        let stale = ControlAction::SetPosition {
            track_id: "/com/roon/mpris/zone_00".to_string(),
            position_micros: 30_000_000,
        };
        let err = plan(&stale, TRACK).unwrap_err();
        assert!(matches!(err, SyncError::StaleSeekTarget { .. }));
        assert!(err.is_silent());
    }

    #[test]
    fn test_local_actions_are_not_routed() {
        assert_eq!(plan(&ControlAction::Quit, TRACK).unwrap(), None);
        assert_eq!(plan(&ControlAction::Raise, TRACK).unwrap(), None);
    }

    #[tokio::test]
    async fn test_dispatch_sends_and_swallows_failures() {
        let transport = Arc::new(RecordingTransport::default());
        dispatch(
            transport.clone(),
            "z1".into(),
            RemoteCommand::Control(ControlVerb::Next),
        )
        .await
        .unwrap();

        transport.fail_next();
        dispatch(
            transport.clone(),
            "z1".into(),
            RemoteCommand::Seek {
                mode: SeekMode::Relative,
                seconds: 2.0,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            transport.sent(),
            vec![
                SentCommand::Control("z1".into(), ControlVerb::Next),
                SentCommand::Seek("z1".into(), SeekMode::Relative, 2.0),
            ]
        );
    }
}
