//! Outbound delivery for solutions.
//!
//! Cleans disallowed markup, splits long text into bounded chunks, sends
//! each chunk as its own message with a part header, and degrades to plain
//! text when Telegram rejects the Markdown variant.

use crate::config::MESSAGE_LIMIT;
use crate::utils;
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tracing::{error, warn};

/// Header prepended to each chunk of a multi-part solution.
#[must_use]
pub fn part_header(index: usize, total: usize) -> String {
    if total > 1 {
        format!("🔹 **Часть {index}/{total}**\n\n")
    } else {
        String::new()
    }
}

/// Sends a solution, split into at most `MESSAGE_LIMIT`-character chunks.
///
/// A chunk whose Markdown send fails is retried once without a parse mode;
/// a second failure is logged and the remaining chunks still go out, so a
/// single bad chunk never aborts the whole delivery.
///
/// # Errors
///
/// Currently infallible at the call site; kept as `Result` so a stricter
/// delivery policy can surface errors without changing callers.
pub async fn send_split_message(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    let cleaned = utils::clean_text(text);
    let parts = utils::split_message(&cleaned, MESSAGE_LIMIT);
    let total = parts.len();

    for (i, part) in parts.iter().enumerate() {
        let decorated = format!("{}{part}", part_header(i + 1, total));

        let rich = bot
            .send_message(chat_id, decorated.clone())
            .parse_mode(ParseMode::Markdown)
            .await;

        if let Err(e) = rich {
            warn!("Markdown send of part {}/{total} failed ({e}), retrying plain", i + 1);
            if let Err(e) = bot.send_message(chat_id, decorated).await {
                error!("Failed to send part {}/{total}: {e}", i + 1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_part_has_no_header() {
        assert_eq!(part_header(1, 1), "");
    }

    #[test]
    fn test_multi_part_header() {
        assert_eq!(part_header(2, 3), "🔹 **Часть 2/3**\n\n");
    }
}
