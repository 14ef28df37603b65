mod storage;
mod synthesizer;
pub mod wav;

pub use storage::{audio_object_key, AudioFileInfo, AudioStorage, LocalAudioStorage, LOCAL_SCHEME};
pub use synthesizer::{
    FakeSpeechSynthesizer, GeminiSpeechSynthesizer, SpeechSynthesizer, GEMINI_TTS_MODEL, SPEAKERS,
};
pub use wav::{encode_audio, EncodedAudio, PcmFormat};
