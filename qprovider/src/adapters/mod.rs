#[cfg(feature = "provider-gemini")]
pub mod gemini;

#[cfg(feature = "provider-horde")]
pub mod horde;
