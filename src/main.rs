use flow_ar::ViewerConfig;

fn main() -> anyhow::Result<()> {
    let mut config = ViewerConfig::default();
    // A local .glb path or another URL may be passed as the first argument
    if let Some(model) = std::env::args().nth(1) {
        config = config.with_model_url(model);
    }
    flow_ar::run(config)
}
