//! Interactive command surface.
//!
//! Every answer is parsed into an [`InputResult`]. Invalid answers are
//! re-prompted here and never reach the runner; `back` and `skip` cancel back
//! to the main menu.

use std::{io::Write, num::NonZeroU32};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{error, warn};

use crate::{
    error::{FailurePolicy, Result},
    types::{Amount, Operation, OperationKind},
    utils::MAX_REPETITIONS,
    wallet::{WalletManager, WalletSelection},
};

/// Outcome of parsing one line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult<T> {
    Valid(T),
    /// Unusable input, with the message shown before re-prompting
    Invalid(String),
    /// The user asked to return to the main menu
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Run(OperationKind),
    Balances,
    Exit,
}

pub fn parse_menu_choice(input: &str) -> InputResult<MenuChoice> {
    match input.trim() {
        "1" => InputResult::Valid(MenuChoice::Run(OperationKind::SwapForward)),
        "2" => InputResult::Valid(MenuChoice::Run(OperationKind::SwapReverse)),
        "3" => InputResult::Valid(MenuChoice::Run(OperationKind::Stake)),
        "4" => InputResult::Valid(MenuChoice::Balances),
        "5" => InputResult::Valid(MenuChoice::Exit),
        _ => InputResult::Invalid("Invalid option. Please select a number between 1 and 5.".into()),
    }
}

pub fn parse_amount(input: &str) -> InputResult<Amount> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("back") {
        return InputResult::Cancelled;
    }
    match input.parse::<Amount>() {
        Ok(amount) => InputResult::Valid(amount),
        Err(_) => InputResult::Invalid("Invalid amount. Please enter a positive number.".into()),
    }
}

pub fn parse_repetitions(input: &str) -> InputResult<NonZeroU32> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("skip") {
        return InputResult::Cancelled;
    }
    match input.parse::<NonZeroU32>() {
        Ok(count) if count.get() <= MAX_REPETITIONS => InputResult::Valid(count),
        Ok(_) => InputResult::Invalid(format!(
            "Too many transactions. Please enter at most {MAX_REPETITIONS}."
        )),
        Err(_) => InputResult::Invalid("Invalid number. Please enter a positive integer.".into()),
    }
}

/// Parses a one-based wallet number or `all`.
pub fn parse_wallet_selection(input: &str, wallet_count: usize) -> InputResult<WalletSelection> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return InputResult::Valid(WalletSelection::All);
    }
    if input.eq_ignore_ascii_case("back") {
        return InputResult::Cancelled;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=wallet_count).contains(&n) => {
            InputResult::Valid(WalletSelection::Single(n - 1))
        }
        _ => InputResult::Invalid(format!(
            "Invalid selection. Enter a number between 1 and {wallet_count} or \"all\"."
        )),
    }
}

/// The numbered main menu, reading answers from `R`.
pub struct Menu<'a, R> {
    manager: &'a WalletManager,
    lines: Lines<R>,
    closed: bool,
}

impl<'a, R> Menu<'a, R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(manager: &'a WalletManager, input: R) -> Self {
        Self {
            manager,
            lines: input.lines(),
            closed: false,
        }
    }

    /// Shows the menu until the user exits or input ends.
    pub async fn run(&mut self) -> Result<()> {
        while !self.closed {
            print_menu();
            let choice = self
                .prompt("\nSelect an option (1-5): ", parse_menu_choice)
                .await?;
            let Some(choice) = choice else {
                continue;
            };
            match choice {
                MenuChoice::Run(kind) => self.run_operation(kind).await?,
                MenuChoice::Balances => self.show_balances().await,
                MenuChoice::Exit => break,
            }
        }
        println!("Exiting the application!");
        Ok(())
    }

    /// Asks until the answer is valid. `None` means cancelled or input closed.
    async fn prompt<T>(
        &mut self,
        question: &str,
        parse: impl Fn(&str) -> InputResult<T>,
    ) -> Result<Option<T>> {
        loop {
            print!("{question}");
            std::io::stdout().flush()?;

            let Some(line) = self.lines.next_line().await? else {
                self.closed = true;
                return Ok(None);
            };
            match parse(&line) {
                InputResult::Valid(value) => return Ok(Some(value)),
                InputResult::Cancelled => return Ok(None),
                InputResult::Invalid(message) => warn!("{}", message),
            }
        }
    }

    async fn select_wallets(&mut self) -> Result<Option<WalletSelection>> {
        let sessions = self.manager.sessions();
        if sessions.len() == 1 {
            println!("Using wallet: {}", sessions[0].address());
            return Ok(Some(WalletSelection::Single(0)));
        }

        println!("Available wallets:");
        for (i, session) in sessions.iter().enumerate() {
            println!("{}. {}", i + 1, session.address());
        }
        let count = sessions.len();
        self.prompt(
            "Select wallet number (or \"all\" to use all wallets): ",
            |input| parse_wallet_selection(input, count),
        )
        .await
    }

    async fn run_operation(&mut self, kind: OperationKind) -> Result<()> {
        let Some(selection) = self.select_wallets().await? else {
            return Ok(());
        };

        for (address, balance) in self.manager.input_balances(kind, selection).await? {
            println!(
                "\nWallet {} - Current {} balance: {}",
                address,
                kind.input_symbol(),
                balance
            );
        }

        let verb = match kind {
            OperationKind::Stake => "stake",
            _ => "swap",
        };
        let amount_question = format!(
            "Enter amount of {} to {} (or \"back\" to return to menu): ",
            kind.input_symbol(),
            verb
        );
        let amount = loop {
            let Some(amount) = self.prompt(&amount_question, parse_amount).await? else {
                return Ok(());
            };
            match self.manager.check_amount(kind, &amount, selection).await {
                Ok(()) => break amount,
                Err(e) if e.policy() == FailurePolicy::Reprompt => warn!("{}", e),
                Err(e) => return Err(e),
            }
        };

        let noun = match kind {
            OperationKind::Stake => "staking",
            _ => "swap",
        };
        let count_question = format!(
            "Enter number of {noun} transactions per wallet (or \"skip\" to return to menu): "
        );
        let Some(repetitions) = self.prompt(&count_question, parse_repetitions).await? else {
            return Ok(());
        };

        let operation = Operation {
            kind,
            amount,
            repetitions,
        };
        match self.manager.execute(&operation, selection).await {
            Ok(report) => println!(
                "Completed {}: {} succeeded, {} failed.",
                operation,
                report.succeeded(),
                report.failed()
            ),
            Err(e) => error!(error = %e, "Could not run {}", operation),
        }
        Ok(())
    }

    async fn show_balances(&self) {
        println!("\nFetching balances for all wallets...");
        for balances in self.manager.balances().await {
            println!("\nWallet: {}", balances.address);
            println!("========== Current Balances ==========");
            println!("ETH: {}", balances.eth);
            println!("USDC: {}", balances.usdc);
            println!("R2USD: {}", balances.r2usd);
            println!("sR2USD: {}", balances.sr2usd);
            println!("======================================");
        }
    }
}

fn print_menu() {
    println!("\n========== USDC/R2USD/sR2USD Bot Menu ==========");
    println!("1. Swap USDC to R2USD");
    println!("2. Swap R2USD to USDC");
    println!("3. Stake R2USD to sR2USD");
    println!("4. Check balances");
    println!("5. Exit");
    println!("================================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_choices() {
        assert_eq!(
            parse_menu_choice(" 3 "),
            InputResult::Valid(MenuChoice::Run(OperationKind::Stake))
        );
        assert_eq!(parse_menu_choice("5"), InputResult::Valid(MenuChoice::Exit));
        assert!(matches!(parse_menu_choice("6"), InputResult::Invalid(_)));
    }

    #[test]
    fn amount_input() {
        assert_eq!(parse_amount("BACK"), InputResult::Cancelled);
        assert!(matches!(parse_amount("-2"), InputResult::Invalid(_)));
        assert!(matches!(parse_amount("abc"), InputResult::Invalid(_)));
        match parse_amount("2.5") {
            InputResult::Valid(amount) => assert_eq!(amount.as_str(), "2.5"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn repetition_input() {
        assert_eq!(parse_repetitions("skip"), InputResult::Cancelled);
        assert_eq!(
            parse_repetitions("3"),
            InputResult::Valid(NonZeroU32::new(3).unwrap())
        );
        assert!(matches!(parse_repetitions("0"), InputResult::Invalid(_)));
        assert!(matches!(parse_repetitions("1.5"), InputResult::Invalid(_)));
        assert_eq!(
            parse_repetitions("10000"),
            InputResult::Valid(NonZeroU32::new(MAX_REPETITIONS).unwrap())
        );
        assert!(matches!(parse_repetitions("10001"), InputResult::Invalid(_)));
        assert!(matches!(parse_repetitions("4294967295"), InputResult::Invalid(_)));
    }

    #[test]
    fn wallet_selection_input() {
        assert_eq!(
            parse_wallet_selection("all", 2),
            InputResult::Valid(WalletSelection::All)
        );
        assert_eq!(
            parse_wallet_selection("2", 2),
            InputResult::Valid(WalletSelection::Single(1))
        );
        assert!(matches!(parse_wallet_selection("0", 2), InputResult::Invalid(_)));
        assert!(matches!(parse_wallet_selection("3", 2), InputResult::Invalid(_)));
        assert_eq!(parse_wallet_selection("back", 2), InputResult::Cancelled);
    }
}
