use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gugudan", about = "Multi-agent multiplication table walker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the supervisor agent only.
    Supervisor,
    /// Run the problem generator agent only.
    Generator,
    /// Run the answer provider agent only.
    Solver,
    /// Run all three agents in one process (the default).
    All,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::All);

    let mut supervisor = None;
    match command {
        Command::Generator => {
            let _handle = gugudan_generator::start(gugudan_generator::GeneratorConfig::from_env())
                .await
                .expect("Failed to start generator");
            tracing::info!("problem generator ready");
            wait_for_shutdown().await;
        }
        Command::Solver => {
            let _handle = gugudan_solver::start(gugudan_solver::SolverConfig::from_env())
                .await
                .expect("Failed to start solver");
            tracing::info!("answer provider ready");
            wait_for_shutdown().await;
        }
        Command::Supervisor => {
            let handle = gugudan_supervisor::start(gugudan_supervisor::SupervisorConfig::from_env())
                .await
                .expect("Failed to start supervisor");
            tracing::info!("supervisor ready");
            supervisor = Some(handle);
            wait_for_shutdown().await;
        }
        Command::All => {
            let generator =
                gugudan_generator::start(gugudan_generator::GeneratorConfig::from_env())
                    .await
                    .expect("Failed to start generator");
            let solver = gugudan_solver::start(gugudan_solver::SolverConfig::from_env())
                .await
                .expect("Failed to start solver");

            let mut config = gugudan_supervisor::SupervisorConfig::from_env();
            if std::env::var("GENERATOR_URL").is_err() {
                config.generator_url = format!("http://localhost:{}", generator.port);
            }
            if std::env::var("SOLVER_URL").is_err() {
                config.solver_url = format!("http://localhost:{}", solver.port);
            }
            let handle = gugudan_supervisor::start(config)
                .await
                .expect("Failed to start supervisor");

            tracing::info!(
                supervisor = handle.port,
                generator = generator.port,
                solver = solver.port,
                "all agents ready"
            );
            supervisor = Some(handle);
            let _keep = (generator, solver);
            wait_for_shutdown().await;
        }
    }

    if let Some(handle) = supervisor {
        let cancelled = handle.supervisor.abort_all();
        if cancelled > 0 {
            tracing::info!(walks = cancelled, "cancelled in-flight walks");
        }
    }
    tracing::info!("Shutting down");
}

async fn wait_for_shutdown() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");
}
