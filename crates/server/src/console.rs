//! Console speech provider
//!
//! Plays prompts as text on stdout and reads caller turns from stdin, one
//! line per turn. Used for local runs without a speech bridge.

use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use voice_support_core::{AccessToken, EndOfSpeech, ListenOutcome, SpeakRequest, SpeechError, SpeechProvider};

pub struct ConsoleSpeechProvider {
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleSpeechProvider {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for ConsoleSpeechProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechProvider for ConsoleSpeechProvider {
    async fn speak(&self, _token: &AccessToken, request: &SpeakRequest) -> Result<(), SpeechError> {
        println!("бот: {}", plain_text(&request.markup));
        Ok(())
    }

    async fn listen(
        &self,
        _token: &AccessToken,
        max_duration: Duration,
    ) -> Result<ListenOutcome, SpeechError> {
        print!("вы> ");
        std::io::stdout()
            .flush()
            .map_err(|e| SpeechError::Transient(e.to_string()))?;

        let mut input = self.input.lock().await;
        match tokio::time::timeout(max_duration, input.next_line()).await {
            Ok(Ok(Some(line))) if line.trim().is_empty() => Ok(ListenOutcome {
                transcript: String::new(),
                confidence: 0.0,
                end: EndOfSpeech::Silence,
            }),
            Ok(Ok(Some(line))) => Ok(ListenOutcome::heard(line.trim(), 1.0)),
            Ok(Ok(None)) => Err(SpeechError::InvalidResponse("console input closed".to_string())),
            Ok(Err(e)) => Err(SpeechError::InvalidResponse(e.to_string())),
            Err(_) => {
                println!();
                Ok(ListenOutcome::timed_out())
            }
        }
    }

    fn name(&self) -> &str {
        "console"
    }
}

/// Markup without tags, with XML escapes resolved
pub fn plain_text(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_strips_tags() {
        assert_eq!(
            plain_text("<speak>Здравствуйте! <break time=\"300ms\"/> Чем помочь?</speak>"),
            "Здравствуйте! Чем помочь?"
        );
    }

    #[test]
    fn test_plain_text_unescapes() {
        assert_eq!(
            plain_text("<speak>ООО &quot;Ромашка&quot; &amp; партнёры &lt;3</speak>"),
            "ООО \"Ромашка\" & партнёры <3"
        );
    }
}
