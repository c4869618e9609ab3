use gallery_viewport::bench;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gallery_viewport=info".parse()?),
        )
        .init();

    let Some(args) = bench::parse_args(std::env::args().skip(1))? else {
        println!("{}", bench::USAGE);
        return Ok(());
    };

    let code = bench::run_benchmark(args)?;
    std::process::exit(code);
}
