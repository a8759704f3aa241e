use burn::{config::Config, optim::AdamConfig};
use {argh::FromArgs, std::fmt::Debug};

pub const CHECKPOINTS_DIR: &str = "./artifacts/checkpoints/";
pub const LOG_PATH: &str = "./artifacts/log.txt";
pub const WIDTH: usize = 300;
pub const HEIGHT: usize = 300;

/// “SSD: Single Shot MultiBox Detector”
/// Authors: Wei Liu, Dragomir Anguelov, Dumitru Erhan, Christian Szegedy,
///          Scott Reed, Cheng-Yang Fu, Alexander C. Berg
/// Link (official): https://arxiv.org/abs/1512.02325
///
/// Training - Section 3.1
///
/// We fine-tune the resulting model using SGD with initial learning rate 10−3,
/// 0.9 momentum, 0.0005 weight decay, and batch size 32. The learning rate
/// decay policy is slightly different for each dataset, and we will describe
/// details later.
///
/// Here Adam is used instead, with the rate lowered on a validation-loss
/// plateau rather than on a fixed iteration schedule.
#[derive(Config)]
pub struct TrainingConfig {
    pub optimizer: AdamConfig,
    #[config(default = 15)]
    pub num_epochs: usize,
    #[config(default = 10)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 1)]
    pub seed: u64,
    #[config(default = 3e-4)]
    pub learning_rate: f64,
    /// fraction of the dataset used for training, the rest validates
    #[config(default = 0.8)]
    pub train_ratio: f32,
    #[config(default = 0.5)]
    pub iou_threshold: f32,
    #[config(default = 3)]
    pub neg_pos_ratio: usize,
    /// multiply the learning rate by this when validation loss plateaus
    #[config(default = 0.1)]
    pub lr_factor: f64,
    /// epochs without improvement before the rate drops
    #[config(default = 10)]
    pub lr_patience: usize,
    /// epochs to wait after a drop before counting again
    #[config(default = 20)]
    pub lr_cooldown: usize,
}

#[derive(FromArgs, PartialEq, Debug)]
/// Top-level command.
pub struct SsdCmd {
    #[argh(subcommand)]
    pub commands: Commands,
    #[argh(option)]
    /// object names to learn from e.g 'chair,bottle,sofa'
    pub o: String,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub enum Commands {
    Train(SubCommandTrain),
}

#[derive(FromArgs, PartialEq, Debug)]
/// Train an SSD model using a Pascal VOC dataset
#[argh(subcommand, name = "train")]
pub struct SubCommandTrain {
    #[argh(option)]
    /// VOC dataset root, the directory holding Annotations/ and JPEGImages/
    pub r: String,
    #[argh(option)]
    /// checkpoint file to resume training from, default None
    pub c: Option<String>,
}
