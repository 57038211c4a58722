//! Interactive prompt flow
//!
//! Answers are collected first and validated as a whole, so every problem is
//! reported at once and nothing touches the network until the input is clean.

use crate::config::Settings;
use crate::error::ClientResult;
use crate::units;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

lazy_static! {
    static ref HEX_SEED: Regex = Regex::new(r"^0x[0-9a-fA-F]{64}$").unwrap();
}

/// Raw answers as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptAnswers {
    /// Menu number or network key
    pub network: String,
    pub secret: String,
    pub recipient: String,
    /// Amount in display units
    pub amount: String,
}

/// Answers that passed validation
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    pub network: String,
    pub secret: String,
    pub recipient: String,
    /// Amount in planck
    pub amount: u128,
}

impl std::fmt::Debug for ValidatedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedInput")
            .field("network", &self.network)
            .field("recipient", &self.recipient)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// Check every answer, returning all failures rather than the first
pub fn validate(
    answers: &PromptAnswers,
    settings: &Settings,
) -> Result<ValidatedInput, Vec<String>> {
    let mut errors = Vec::new();
    let keys = settings.network_keys();

    let choice = answers.network.trim();
    let network = if choice.is_empty() {
        Some(settings.client.default_network.clone())
    } else if let Ok(index) = choice.parse::<usize>() {
        index
            .checked_sub(1)
            .and_then(|i| keys.get(i))
            .map(|key| key.to_string())
    } else {
        keys.iter()
            .find(|key| **key == choice)
            .map(|key| key.to_string())
    };
    if network.is_none() {
        errors.push(format!("Unknown network selection: {}", choice));
    }

    let secret = answers.secret.trim();
    if !HEX_SEED.is_match(secret) {
        errors.push("Secret must be a 0x-prefixed 32-byte hex seed (66 characters)".to_string());
    }

    let recipient = answers.recipient.trim();
    if recipient.is_empty() {
        errors.push("Recipient address is required".to_string());
    }

    let amount = match units::to_smallest_unit(answers.amount.trim()) {
        Ok(0) => {
            errors.push("Amount must be greater than zero".to_string());
            None
        }
        Ok(planck) => Some(planck),
        Err(e) => {
            errors.push(e.to_string());
            None
        }
    };

    match (network, amount) {
        (Some(network), Some(amount)) if errors.is_empty() => Ok(ValidatedInput {
            network,
            secret: secret.to_string(),
            recipient: recipient.to_string(),
            amount,
        }),
        _ => Err(errors),
    }
}

/// Ask for each answer on `writer`, reading replies line by line from `reader`
pub async fn collect<R, W>(
    reader: &mut R,
    writer: &mut W,
    settings: &Settings,
) -> ClientResult<PromptAnswers>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut menu = String::from("Select network:\n");
    for (i, key) in settings.network_keys().iter().enumerate() {
        if let Some(network) = settings.networks.get(*key) {
            menu.push_str(&format!("  {}) {} ({})\n", i + 1, key, network.ws_url));
        }
    }
    menu.push_str(&format!("Choice [{}]: ", settings.client.default_network));

    let network = ask(reader, writer, &menu).await?;
    let secret = ask(reader, writer, "Secret seed (0x...): ").await?;
    let recipient = ask(reader, writer, "Recipient address: ").await?;
    let amount = ask(reader, writer, "Amount: ").await?;

    Ok(PromptAnswers {
        network,
        secret,
        recipient,
        amount,
    })
}

async fn ask<R, W>(reader: &mut R, writer: &mut W, question: &str) -> ClientResult<String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(question.as_bytes()).await?;
    writer.flush().await?;

    let mut line = String::new();
    reader.read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn answers() -> PromptAnswers {
        PromptAnswers {
            network: "2".into(),
            secret: SEED.into(),
            recipient: BOB.into(),
            amount: "1.5".into(),
        }
    }

    #[test]
    fn test_valid_answers() {
        let input = validate(&answers(), &Settings::builtin()).unwrap();
        assert_eq!(input.network, "westend");
        assert_eq!(input.amount, 1_500_000_000_000);
        assert_eq!(input.recipient, BOB);
    }

    #[test]
    fn test_network_by_name_or_default() {
        let settings = Settings::builtin();
        let mut by_name = answers();
        by_name.network = "local".into();
        assert_eq!(validate(&by_name, &settings).unwrap().network, "local");

        let mut blank = answers();
        blank.network = String::new();
        assert_eq!(validate(&blank, &settings).unwrap().network, "westend");
    }

    #[test]
    fn test_reports_every_error() {
        let bad = PromptAnswers {
            network: "7".into(),
            secret: "0x1234".into(),
            recipient: "  ".into(),
            amount: "-3".into(),
        };
        let errors = validate(&bad, &Settings::builtin()).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut zero = answers();
        zero.amount = "0.0".into();
        let errors = validate(&zero, &Settings::builtin()).unwrap_err();
        assert_eq!(errors, vec!["Amount must be greater than zero".to_string()]);
    }

    #[test]
    fn test_secret_shape() {
        let mut short = answers();
        short.secret = SEED[..65].to_string();
        assert!(validate(&short, &Settings::builtin()).is_err());

        let mut unprefixed = answers();
        unprefixed.secret = format!("00{}", &SEED[2..]);
        assert!(validate(&unprefixed, &Settings::builtin()).is_err());
    }

    #[tokio::test]
    async fn test_collect_reads_each_answer() {
        let input = format!("local\n{}\n{}\r\n2.25\n", SEED, BOB);
        let mut reader = tokio::io::BufReader::new(input.as_bytes());
        let mut output = Vec::new();

        let answers = collect(&mut reader, &mut output, &Settings::builtin())
            .await
            .unwrap();

        assert_eq!(answers.network, "local");
        assert_eq!(answers.recipient, BOB);
        assert_eq!(answers.amount, "2.25");

        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("1) local (ws://127.0.0.1:9944)"));
        assert!(transcript.contains("2) westend"));
        assert!(transcript.ends_with("Amount: "));
    }
}
