use accept_banano::domain::ports::DiagnosticSinkRef;
use accept_banano::infrastructure::diagnostics::TracingSink;
use accept_banano::infrastructure::http::{HttpGateway, HttpGatewayConfig};
use accept_banano::interfaces::push::{PushListener, push_url};
use accept_banano::{
    Command, CreatePaymentParams, Currency, PaymentService, PaymentServiceConfig, PaymentToken,
    State,
};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the payment gateway API
    #[arg(long)]
    api_url: String,

    /// Base URL of the gateway's push channel. Enables push updates next to polling.
    #[arg(long)]
    ws_url: Option<String>,

    /// Delay between verification polls, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Print lifecycle diagnostics to stderr
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Create a new payment session and wait for it to be verified
    Create {
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        currency: Currency,
        /// Opaque merchant state echoed back by the gateway
        #[arg(long)]
        state: Option<String>,
    },
    /// Wait for an existing payment session to be verified
    Verify { token: String },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config =
        PaymentServiceConfig::new(Duration::from_millis(cli.poll_interval_ms)).into_diagnostic()?;
    let command = match cli.action {
        Action::Create {
            amount,
            currency,
            state,
        } => {
            let params = CreatePaymentParams::new(amount, currency).into_diagnostic()?;
            Command::CreatePayment(match state {
                Some(state) => params.with_state(state),
                None => params,
            })
        }
        Action::Verify { token } => Command::StartPaymentVerification(PaymentToken::new(token)),
    };

    let gateway = HttpGateway::new(HttpGatewayConfig::new(cli.api_url)).into_diagnostic()?;
    let diagnostics: DiagnosticSinkRef = Arc::new(TracingSink);
    let mut service =
        PaymentService::new(Arc::new(gateway), config).with_diagnostics(diagnostics.clone());
    let mut transitions = service.subscribe();
    let handle = service.start();
    handle.send(command).into_diagnostic()?;

    let mut push: Option<PushListener> = None;
    let mut terminated = false;
    loop {
        tokio::select! {
            snapshot = transitions.recv() => {
                let Some(snapshot) = snapshot else { break };
                println!("{}", serde_json::to_string(&snapshot).into_diagnostic()?);

                if push.is_none()
                    && let (Some(ws_url), Some(payment)) = (&cli.ws_url, &snapshot.context.payment)
                {
                    let (listener, signals) =
                        PushListener::connect(push_url(ws_url, &payment.token), diagnostics.clone());
                    handle.attach_push(signals);
                    push = Some(listener);
                }
            }
            _ = tokio::signal::ctrl_c(), if !terminated => {
                terminated = true;
                if let Err(e) = handle.send(Command::Terminate) {
                    eprintln!("Error terminating payment: {}", e);
                }
            }
        }
    }

    if let Some(listener) = push {
        listener.close();
    }

    let last = handle.finished().await.into_diagnostic()?;
    match (last.state, last.context.error) {
        (State::Success, _) => Ok(()),
        (_, Some(error)) => Err(miette!("payment failed: {error}")),
        (state, None) => Err(miette!("payment stopped in state {state}")),
    }
}
