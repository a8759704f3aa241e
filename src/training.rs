use std::io;
use std::path::Path;

use crate::boxes::priors_for_feature_maps;
use crate::config::CHECKPOINTS_DIR;
use crate::data::BatchType;
use crate::schedule::ReduceLrOnPlateau;
use crate::stats::Stats;
use crate::voc::VocDataset;
use crate::{config::TrainingConfig, labels::ClassMap};
use crate::{data::SsdBatcher, loss::MultiboxLoss, models::ssd::Ssd};
use burn::record::Recorder;
use burn::{
    data::dataloader::DataLoaderBuilder,
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, cast::ToElement},
};

fn create_dir(dir: &str) {
    if std::fs::exists(dir).unwrap_or(false) {
        println!("Directory {} exists, remove? (y)", dir);
        let mut response = String::new();

        io::stdin()
            .read_line(&mut response)
            .expect("Failed to read line");

        if response.contains("y") {
            std::fs::remove_dir_all(dir).ok();
            std::fs::create_dir_all(dir).ok();
        }
    } else {
        std::fs::create_dir_all(dir).ok();
    }
}

/// Trains an SSD300 detector on a Pascal VOC directory.
///
/// The annotated images are split into train/validation by `train_ratio`, the
/// model sees the training split with random horizontal flips, and after each
/// epoch the full validation split is scored. Every epoch a checkpoint named
/// after the epoch and its validation loss lands in `CHECKPOINTS_DIR`, and
/// the validation loss drives the plateau learning-rate schedule.
pub fn train<B: AutodiffBackend>(
    config: TrainingConfig,
    device: &B::Device,
    class_map: &ClassMap,
    checkpoint: Option<String>,
    voc_root: String,
) {
    let mut model = match &checkpoint {
        None => {
            create_dir(CHECKPOINTS_DIR);
            Ssd::<B>::new(device, None, class_map.count())
        }
        Some(cp_name) => {
            let record = CompactRecorder::new()
                .load(cp_name.clone().into(), device)
                .unwrap_or_else(|_| panic!("Couldn't find trained model at {}", cp_name));
            println!("Found weights file at {}", cp_name);
            Ssd::<B>::new(device, Some(record), class_map.count())
        }
    };

    B::seed(config.seed);

    let mut optim = config.optimizer.init();
    let mut schedule = ReduceLrOnPlateau::new(
        config.learning_rate,
        config.lr_factor,
        config.lr_patience,
        config.lr_cooldown,
    );

    let dataset = VocDataset::from_dir(Path::new(&voc_root), class_map)
        .unwrap_or_else(|e| panic!("Couldn't load the VOC dataset at {}: {}", voc_root, e));
    let (ds_train, ds_valid) = dataset.split(config.train_ratio, config.seed);

    println!(
        "Training on {} images, validating on {}",
        ds_train.len(),
        ds_valid.len()
    );

    let batcher_train = SsdBatcher::new(BatchType::Train);
    let batcher_valid = SsdBatcher::new(BatchType::Test);

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .set_device(device.clone())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(ds_train);

    let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
        .set_device(device.clone())
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(ds_valid);

    let multibox = MultiboxLoss {
        iou_threshold: config.iou_threshold,
        neg_pos_ratio: config.neg_pos_ratio,
        alpha: 1.0,
    };

    let mut stats = Stats::new(config.batch_size);

    for epoch in 1..config.num_epochs + 1 {
        let lr = schedule.lr();

        for (iteration, batch) in dataloader_train.iter().enumerate() {
            let (class_predictors, box_predictions, outputs) = model.forward(batch.images.clone());

            let priors = priors_for_feature_maps(&outputs);
            let (loss, _) =
                multibox.forward(class_predictors, box_predictions, priors, &batch);

            // loss is an accumulation relative to batch size so divide by this
            let loss = loss / config.batch_size.to_f32();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            stats.update(loss, iteration, "Train".into(), epoch);
        }

        stats.flush();

        let m_valid = model.valid();

        for (iteration, batch) in dataloader_valid.iter().enumerate() {
            let (class_predictors, box_predictions, outputs) =
                m_valid.forward(batch.images.clone());

            let priors = priors_for_feature_maps(&outputs);
            let (loss, _targets) =
                multibox.forward(class_predictors, box_predictions, priors, &batch);

            let loss = loss.div_scalar(config.batch_size.to_f32());

            stats.update(loss, iteration, "Valid".into(), epoch);
        }

        let val_loss = stats.avg();
        stats.flush();

        model
            .clone()
            .save_file(
                format!("{CHECKPOINTS_DIR}weights-{epoch:02}-{val_loss:.2}"),
                &CompactRecorder::new(),
            )
            .expect("Trained model should be saved successfully");

        schedule.step(val_loss as f64);
    }
}
