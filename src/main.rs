use burn::{
    backend::{Autodiff, NdArray, ndarray::NdArrayDevice},
    config::Config,
    optim::AdamConfig,
};
use voc_ssd::{
    config::{Commands, SsdCmd, TrainingConfig},
    labels::ClassMap,
    training,
};

const CONFIG_PATH: &str = "./config/training_config.json";

fn load_or_init_config() -> TrainingConfig {
    match TrainingConfig::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(_) => {
            let config = TrainingConfig::new(AdamConfig::new());
            std::fs::create_dir_all("./config").ok();
            config
                .save(CONFIG_PATH)
                .expect("Config file should be writable");
            println!("Wrote a default training config to {}", CONFIG_PATH);
            config
        }
    }
}

fn main() {
    type AutoDiffBackend = Autodiff<NdArray>;
    let device = NdArrayDevice::default();

    let cli_cmd: SsdCmd = argh::from_env();
    let class_map = ClassMap::new(cli_cmd.o.split(',').collect());

    match cli_cmd.commands {
        Commands::Train(sub_command_train) => {
            let checkpoint = sub_command_train.c;
            let voc_root = sub_command_train.r;
            let config = load_or_init_config();
            training::train::<AutoDiffBackend>(config, &device, &class_map, checkpoint, voc_root);
        }
    };
}
