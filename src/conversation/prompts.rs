//! User-facing texts sent by the conversation.

use crate::error::InputError;

pub const ASK_FILE: &str = "👋 Send a `.txt` file with phone numbers (one per line).";
pub const ASK_FILE_COUNT: &str = "📦 How many VCF files would you like?";
pub const ASK_PER_FILE_COUNT: &str = "🔢 How many numbers in each VCF file?";
pub const ASK_NAME_PREFIX: &str = "🧍 Enter a contact name prefix (e.g., Client):";
pub const ASK_FILE_BASE_NAME: &str = "📁 Enter base file name for VCF files (e.g., contacts):";

pub const DONE: &str = "✅ VCF files generated successfully.";
pub const CANCELLED: &str = "❌ Cancelled. Use /start to restart.";
pub const STOPPED: &str = "🤖 Bot is currently stopped. Use /startbot to activate.";
pub const ENABLED: &str = "✅ Bot is now active!";
pub const DISABLED: &str = "⏸️ Bot is now paused. Use /startbot to reactivate.";
pub const NOT_ADMIN: &str = "⛔ You are not allowed to change the bot state.";
pub const FAILED: &str = "⚠️ Something went wrong while processing your request. Use /start to try again.";

/// Reply for a rejected input.
pub fn input_error(err: &InputError) -> String {
    match err {
        InputError::WrongExtension { .. } => "❌ Only .txt files are supported.".to_string(),
        InputError::EmptyFile => {
            "❌ The file contains no phone numbers. Send a `.txt` file with one number per line."
                .to_string()
        }
        InputError::InvalidCount { .. } => "❌ Enter a valid number.".to_string(),
        InputError::CountMismatch {
            uploaded,
            file_count,
            per_file,
            expected,
        } => {
            let expected = expected.map_or_else(|| "too many".to_string(), |n| n.to_string());
            format!(
                "❌ Mismatch: {uploaded} numbers uploaded, but {file_count} × {per_file} = {expected}.\nFix and try again."
            )
        }
        InputError::EmptyBaseName => "❌ The file name cannot be empty. Enter a base file name:".to_string(),
    }
}
