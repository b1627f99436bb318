use serde::{Deserialize, Serialize};

/// Commands a control surface sends to a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ControlCommand {
    /// Zero the microphone gain
    Mute,
    /// Restore unit microphone gain
    Unmute,
    /// End the session (drains the transcription queue before finalizing)
    Stop,
    /// Flip whether new chunks are fed to the recognizer
    ToggleTranscription,
    /// Control surface geometry hint; carried for window-style front-ends
    Resize { width: u32, height: u32 },
}

/// Events a session publishes back to its control surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ControlEvent {
    /// Periodic signal level of the mixed stream, RMS in [0.0, 1.0]
    Level { rms: f32 },
    /// Transcription was switched on or off mid-recording
    TranscriptionToggled { enabled: bool },
    /// Microphone mute state changed
    MuteChanged { muted: bool },
    /// The session finished and the output file was written
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_serialize_as_tagged_names() {
        let json = serde_json::to_string(&ControlCommand::ToggleTranscription).unwrap();
        assert_eq!(json, r#"{"command":"toggle-transcription"}"#);

        let cmd: ControlCommand =
            serde_json::from_str(r#"{"command":"resize","width":320,"height":48}"#).unwrap();
        assert_eq!(
            cmd,
            ControlCommand::Resize {
                width: 320,
                height: 48
            }
        );
    }

    #[test]
    fn events_round_trip() {
        let event = ControlEvent::Level { rms: 0.25 };
        let json = serde_json::to_string(&event).unwrap();
        let back: ControlEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
