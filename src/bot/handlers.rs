//! Telegram update handlers.
//!
//! Each incoming update hits exactly one of these: the `/start` command,
//! a mode button press, an API-key-looking text (BYOK intake), a photo,
//! or a plain text problem.

use crate::bot::{media, messaging, state::ModeStore};
use crate::config::USER_KEY_PREFIX;
use crate::llm::store::KeyStore;
use crate::llm::{ImageAttachment, Mode, SolveError, SolveRequest, Solver};
use anyhow::Result;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;
use tracing::info;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Поддерживаемые команды:")]
pub enum Command {
    #[command(description = "Начать работу.")]
    Start,
}

/// Fixed welcome; sending it performs no AI call.
pub const WELCOME_TEXT: &str = "Привет! Пришли фото или текст задачи — я решу её подробно.\n\
    Стиль ответа выбирается кнопками ниже.\n\
    Свой ключ Gemini (начинается с AIza...) можно просто отправить сообщением.";

/// Prompt used when a photo arrives without a caption.
pub const DEFAULT_PHOTO_PROMPT: &str = "Реши задачу с фото подробно.";

/// One row of mode buttons.
#[must_use]
pub fn mode_keyboard() -> InlineKeyboardMarkup {
    let row: Vec<InlineKeyboardButton> = Mode::ALL
        .into_iter()
        .map(|mode| InlineKeyboardButton::callback(mode.title(), mode.callback_data()))
        .collect();
    InlineKeyboardMarkup::new(vec![row])
}

/// Literal prefix match; the only validation a user key gets.
#[must_use]
pub fn is_api_key_message(text: &str) -> bool {
    text.trim_start().starts_with(USER_KEY_PREFIX)
}

fn user_id_of(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .map(|u| u.id.0.cast_signed())
        .unwrap_or_default()
}

/// `/start`: welcome text with the mode keyboard.
///
/// # Errors
///
/// Returns an error if the Telegram API call fails.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, WELCOME_TEXT)
        .reply_markup(mode_keyboard())
        .await?;
    Ok(())
}

/// Mode button press: store the selection and acknowledge the callback.
///
/// # Errors
///
/// Returns an error if the Telegram API call fails.
pub async fn handle_mode_callback(
    bot: Bot,
    q: CallbackQuery,
    modes: Arc<ModeStore>,
) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(mode) = Mode::from_callback(data) else {
        return Ok(());
    };

    let user_id = q.from.id.0.cast_signed();
    modes.set(user_id, mode);
    info!("User {user_id} switched mode to {mode:?}");

    bot.answer_callback_query(q.id.clone())
        .text(format!("Режим: {}", mode.title()))
        .await?;
    Ok(())
}

/// BYOK intake: store the key for this user, last write wins.
///
/// # Errors
///
/// Returns an error if the Telegram API call fails.
pub async fn handle_api_key(bot: Bot, msg: Message, keys: Arc<dyn KeyStore>) -> Result<()> {
    let key = msg.text().unwrap_or_default().trim();
    let user_id = user_id_of(&msg);
    keys.set(user_id, key.to_string());
    info!("Stored override key for user {user_id}");

    bot.send_message(
        msg.chat.id,
        "Ключ сохранён! Теперь запросы идут через твой ключ Gemini.",
    )
    .await?;
    Ok(())
}

/// Plain text problem: solve and deliver.
///
/// # Errors
///
/// Returns an error if a Telegram API call fails.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    solver: Arc<Solver>,
    modes: Arc<ModeStore>,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user_id = user_id_of(&msg);

    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await?;

    let request = SolveRequest::text(text, modes.get(user_id));
    let outcome = solver.solve(user_id, &request).await;
    deliver(&bot, msg.chat.id, outcome).await
}

/// Photo problem: download, downscale, solve with the caption as prompt.
///
/// # Errors
///
/// Returns an error if a Telegram API call fails or the photo cannot be
/// decoded.
pub async fn handle_photo(
    bot: Bot,
    msg: Message,
    solver: Arc<Solver>,
    modes: Arc<ModeStore>,
) -> Result<()> {
    // largest available size is last
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };
    let user_id = user_id_of(&msg);
    let caption = msg.caption().unwrap_or(DEFAULT_PHOTO_PROMPT);

    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await?;

    let file = bot.get_file(photo.file.id.clone()).await?;
    let mut buffer = Vec::new();
    bot.download_file(&file.path, &mut buffer).await?;

    let jpeg = media::downscale_to_jpeg(&buffer)?;
    let image = ImageAttachment {
        bytes: jpeg,
        mime_type: "image/jpeg".to_string(),
    };

    let request = SolveRequest::with_image(caption, image, modes.get(user_id));
    let outcome = solver.solve(user_id, &request).await;
    deliver(&bot, msg.chat.id, outcome).await
}

async fn deliver(bot: &Bot, chat_id: ChatId, outcome: Result<String, SolveError>) -> Result<()> {
    match outcome {
        Ok(solution) => messaging::send_split_message(bot, chat_id, &solution).await,
        Err(e) => {
            bot.send_message(chat_id, failure_reply(&e)).await?;
            Ok(())
        }
    }
}

/// User-facing wording per failure category; the pool/BYOK distinction
/// decides whether to offer the bring-your-own-key affordance.
#[must_use]
pub fn failure_reply(error: &SolveError) -> &'static str {
    match error {
        SolveError::PoolExhausted => {
            "Лимиты общих ключей исчерпаны. Попробуй позже или отправь свой ключ Gemini (начинается с AIza...)."
        }
        SolveError::UserKeyExhausted => {
            "Твой ключ исчерпал лимит запросов. Подожди немного или отправь другой ключ."
        }
        SolveError::Transient(_) => "Ошибка ИИ после нескольких попыток. Попробуй ещё раз позже.",
        SolveError::NoCredentials => {
            "Бот не настроен: нет ни одного ключа API. Отправь свой ключ Gemini (начинается с AIza...)."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_api_key_recognition() {
        assert!(is_api_key_message("AIzaSyExampleExampleExampleExample123"));
        assert!(is_api_key_message("  AIzaWithLeadingSpaces"));
        assert!(!is_api_key_message("реши уравнение x^2 = 4"));
        assert!(!is_api_key_message("/start"));
        assert!(!is_api_key_message("ключ: AIza не в начале"));
    }

    #[test]
    fn test_start_routes_to_the_command_branch() {
        // the command parser claims /start, so it never reaches the
        // plain-text (solving) handler
        let cmd = Command::parse("/start", "gdz_bot").unwrap();
        assert!(matches!(cmd, Command::Start));
        assert!(!is_api_key_message("/start"));
        assert!(Command::parse("реши уравнение", "gdz_bot").is_err());
    }

    #[test]
    fn test_welcome_is_fixed_and_offers_byok() {
        assert!(!WELCOME_TEXT.is_empty());
        assert!(WELCOME_TEXT.contains(USER_KEY_PREFIX));
    }

    #[test]
    fn test_mode_keyboard_covers_all_modes() {
        let keyboard = mode_keyboard();
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), Mode::ALL.len());
    }

    #[test]
    fn test_failure_replies_are_distinct() {
        let replies = [
            failure_reply(&SolveError::PoolExhausted),
            failure_reply(&SolveError::UserKeyExhausted),
            failure_reply(&SolveError::Transient(LlmError::Network("boom".into()))),
            failure_reply(&SolveError::NoCredentials),
        ];
        for (i, a) in replies.iter().enumerate() {
            for b in replies.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        // exhaustion of the shared pool must offer BYOK
        assert!(failure_reply(&SolveError::PoolExhausted).contains("AIza"));
    }
}
