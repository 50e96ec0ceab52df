// Wire types for the live voice WebSocket.
//
// Outbound: one setup message when the connection opens, then one
// realtime-input envelope per microphone frame. Inbound: server messages
// carrying model speech as base64 PCM plus an interruption flag. Inbound
// parsing is deliberately tolerant; the server sends more fields than the
// session needs and they must not break decode.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// MIME type of outbound microphone frames.
pub const PCM_16K_MIME: &str = "audio/pcm;rate=16000";

/// Encode raw PCM bytes for the wire.
pub fn encode_audio(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 audio payload back to raw PCM bytes.
pub fn decode_audio(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data)
}

// ============================================================================
// Outbound: session setup
// ============================================================================

/// Top-level wrapper for the setup message.
#[derive(Debug, Clone, Serialize)]
pub struct SetupEnvelope {
    pub setup: SessionSetup,
}

/// Session configuration sent as the first message on the socket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSetup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: SystemInstruction,
}

impl SessionSetup {
    /// Audio-only session with a fixed voice and persona.
    pub fn new(model: &str, voice_name: &str, system_instruction: &str) -> Self {
        Self {
            model: model.to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice_name.to_string(),
                        },
                    },
                },
            },
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: system_instruction.to_string(),
                }],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

// ============================================================================
// Outbound: realtime audio
// ============================================================================

/// One microphone frame on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputEnvelope {
    pub realtime_input: RealtimeInput,
}

impl RealtimeInputEnvelope {
    /// Wrap one base64-encoded 16 kHz PCM frame.
    pub fn pcm_frame(encoded: String) -> Self {
        Self {
            realtime_input: RealtimeInput {
                media: MediaBlob {
                    mime_type: PCM_16K_MIME.to_string(),
                    data: encoded,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub media: MediaBlob,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBlob {
    pub mime_type: String,
    pub data: String,
}

// ============================================================================
// Inbound: server messages
// ============================================================================

/// A message from the live session. Only the fields the session acts on
/// are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub interrupted: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

impl ServerMessage {
    /// Base64 speech payload of the first model-turn part, if present.
    pub fn audio_data(&self) -> Option<&str> {
        let data = self
            .server_content
            .as_ref()?
            .model_turn
            .as_ref()?
            .parts
            .first()?
            .inline_data
            .as_ref()?
            .data
            .as_str();
        if data.is_empty() {
            None
        } else {
            Some(data)
        }
    }

    /// Whether the server reported the user talking over the model.
    pub fn is_interrupted(&self) -> bool {
        self.server_content
            .as_ref()
            .and_then(|c| c.interrupted)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_encode_decode_round_trip() {
        let payloads: Vec<Vec<u8>> = vec![
            vec![],
            vec![0],
            vec![0xff, 0x00, 0x7f, 0x80],
            (0..=255).collect(),
        ];
        for bytes in payloads {
            let encoded = encode_audio(&bytes);
            assert_eq!(decode_audio(&encoded).unwrap(), bytes);
        }
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(decode_audio("not valid base64!!!").is_err());
    }

    #[test]
    fn test_setup_envelope_uses_camel_case_keys() {
        let setup = SessionSetup::new("models/test-model", "Kore", "Seja breve.");
        let value = serde_json::to_value(SetupEnvelope { setup }).unwrap();

        assert_eq!(
            value.pointer("/setup/model").and_then(|v| v.as_str()),
            Some("models/test-model")
        );
        assert_eq!(
            value
                .pointer("/setup/generationConfig/responseModalities/0")
                .and_then(|v| v.as_str()),
            Some("AUDIO")
        );
        assert_eq!(
            value
                .pointer("/setup/generationConfig/speechConfig/voiceConfig/prebuiltVoiceConfig/voiceName")
                .and_then(|v| v.as_str()),
            Some("Kore")
        );
        assert_eq!(
            value
                .pointer("/setup/systemInstruction/parts/0/text")
                .and_then(|v| v.as_str()),
            Some("Seja breve.")
        );
    }

    #[test]
    fn test_realtime_input_envelope_shape() {
        let envelope = RealtimeInputEnvelope::pcm_frame("AAAA".to_string());
        let value = serde_json::to_value(envelope).unwrap();

        assert_eq!(
            value
                .pointer("/realtimeInput/media/mimeType")
                .and_then(|v| v.as_str()),
            Some(PCM_16K_MIME)
        );
        assert_eq!(
            value
                .pointer("/realtimeInput/media/data")
                .and_then(|v| v.as_str()),
            Some("AAAA")
        );
    }

    #[test]
    fn test_server_message_with_audio_part() {
        let json = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "UklGRg=="}}
                    ]
                }
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.audio_data(), Some("UklGRg=="));
        assert!(!msg.is_interrupted());
    }

    #[test]
    fn test_server_message_interrupted() {
        let json = r#"{"serverContent": {"interrupted": true}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert!(msg.is_interrupted());
        assert_eq!(msg.audio_data(), None);
    }

    #[test]
    fn test_server_message_tolerates_unknown_fields() {
        let json = r#"{
            "setupComplete": {},
            "usageMetadata": {"promptTokenCount": 10},
            "serverContent": {"turnComplete": true}
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.audio_data(), None);
        assert!(!msg.is_interrupted());
    }

    #[test]
    fn test_empty_server_message() {
        let msg: ServerMessage = serde_json::from_str("{}").unwrap();
        assert_eq!(msg.audio_data(), None);
        assert!(!msg.is_interrupted());
    }

    #[test]
    fn test_server_message_with_text_only_part() {
        // Some turns carry text parts with no inline audio.
        let json = r#"{
            "serverContent": {"modelTurn": {"parts": [{"text": "ola"}]}}
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.audio_data(), None);
    }
}
