use std::env;

#[tokio::main]
async fn main() -> zephyr_cache::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();

    #[cfg(feature = "cli")]
    {
        if args.is_empty() {
            zephyr_cache::cli::print_usage();
            std::process::exit(0);
        }

        let parsed = match zephyr_cache::cli::parse_args(&args) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("Error: {e}");
                eprintln!();
                zephyr_cache::cli::print_usage();
                std::process::exit(2);
            }
        };

        zephyr_cache::cli::run(parsed).await
    }
    #[cfg(not(feature = "cli"))]
    {
        let _ = args;
        eprintln!("CLI support not compiled in");
        std::process::exit(1);
    }
}
