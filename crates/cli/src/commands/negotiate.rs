use std::io::Write as _;

use anyhow::Result;
use haggle_agent::{AgentGateway, HttpAgentGateway, NegotiationRuntime};
use haggle_core::config::AppConfig;
use haggle_core::{Cart, DomainError, FloorRule, NegotiationOutcome};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::catalog;

#[derive(Debug, PartialEq, Eq)]
pub struct NegotiationReport {
    pub sealed: bool,
    pub discount: Decimal,
    pub payable: Decimal,
    pub turns: u32,
}

pub async fn run(config: &AppConfig) -> Result<()> {
    let gateway = HttpAgentGateway::from_config(&config.llm)?;
    let mut cart = catalog::demo_cart();

    println!("{}", super::cart::run(config));
    println!();

    let stdin = BufReader::new(tokio::io::stdin());
    let report = negotiate_loop(gateway, config, &mut cart, stdin).await?;

    let currency = &config.negotiation.currency;
    if report.sealed {
        println!(
            "Discount applied: {currency}{}. New payable total: {currency}{}.",
            report.discount, report.payable
        );
    } else {
        println!("Negotiation closed without a deal. Payable stays {currency}{}.", report.payable);
    }
    Ok(())
}

/// The interactive offer loop, generic over the gateway and the input source
/// so a scripted negotiation can run in tests. `quit`, `exit`, or EOF
/// abandons; a sealed deal is committed into the cart before returning.
pub async fn negotiate_loop<G, R>(
    gateway: G,
    config: &AppConfig,
    cart: &mut Cart,
    input: R,
) -> Result<NegotiationReport>
where
    G: AgentGateway,
    R: AsyncBufRead + Unpin,
{
    let rule = FloorRule { floor_pct: config.negotiation.floor_pct };
    let currency = &config.negotiation.currency;
    let runtime = NegotiationRuntime::open(gateway, &cart.snapshot(), rule, currency);

    for message in runtime.transcript().await {
        println!("agent> {}", message.text);
    }

    let mut lines = input.lines();
    let mut turns = 0u32;
    loop {
        print!("you> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else { break };
        let text = line.trim();
        if text.eq_ignore_ascii_case("quit") || text.eq_ignore_ascii_case("exit") {
            break;
        }

        match runtime.submit_offer(text).await {
            Ok(outcome) => {
                turns += 1;
                match outcome {
                    NegotiationOutcome::Countered(reply) => println!("agent> {reply}"),
                    NegotiationOutcome::Finalized { discount, .. } => {
                        if let Some(confirmation) = runtime.transcript().await.last() {
                            println!("agent> {}", confirmation.text);
                        }
                        runtime.commit(cart).await?;
                        return Ok(NegotiationReport {
                            sealed: true,
                            discount,
                            payable: cart.payable(),
                            turns,
                        });
                    }
                    NegotiationOutcome::GatewayFailure(_) => {
                        if let Some(prompt) = runtime.transcript().await.last() {
                            println!("agent> {}", prompt.text);
                        }
                    }
                    NegotiationOutcome::Pending | NegotiationOutcome::Discarded => {}
                }
            }
            Err(DomainError::EmptyOffer) => {
                println!("(type an offer, or `quit` to leave)");
            }
            Err(error) => println!("({})", error.user_message()),
        }
    }

    runtime.abandon().await;
    Ok(NegotiationReport {
        sealed: false,
        discount: Decimal::ZERO,
        payable: cart.payable(),
        turns,
    })
}
