//! Speech synthesis provider implementations
//!
//! Contains concrete implementations of the `TextToSpeech` trait.

pub mod openai;

pub use openai::OpenAISpeechProvider;
