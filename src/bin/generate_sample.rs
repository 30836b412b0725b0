//! Write synthetic HMNIST pixel tables and HAM10000 metadata for local seeding.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// HMNIST class index → HAM10000 diagnosis code.
const CLASSES: [&str; 7] = ["akiec", "bcc", "bkl", "df", "nv", "vasc", "mel"];
const DX_TYPES: [&str; 4] = ["histo", "follow_up", "consensus", "confocal"];
const SEXES: [&str; 3] = ["male", "female", "unknown"];
const SITES: [&str; 8] = [
    "back",
    "lower extremity",
    "trunk",
    "upper extremity",
    "abdomen",
    "face",
    "chest",
    "scalp",
];

#[derive(Parser, Debug)]
#[command(name = "generate_sample", about = "Write synthetic HMNIST / HAM10000 sample files.")]
struct Args {
    /// Output directory.
    #[arg(long, default_value = "sample_data")]
    out_dir: PathBuf,

    /// Rows per class in each pixel table.
    #[arg(long, default_value_t = 40)]
    per_class: usize,

    /// Rows in the metadata tables.
    #[arg(long, default_value_t = 500)]
    metadata_rows: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

// ---------------------------------------------------------------------------
// Pixel tables
// ---------------------------------------------------------------------------

/// Mean RGB colour of each class; lesions are a darker disc on lighter skin.
fn class_tint(class: usize) -> [f64; 3] {
    let shift = class as f64 * 18.0;
    [200.0 - shift, 150.0 - shift * 0.5, 130.0 + shift * 0.6]
}

fn synth_image(side: usize, channels: usize, class: usize, rng: &mut ChaCha8Rng) -> Vec<u8> {
    let tint = class_tint(class);
    let radius = side as f64 * (0.2 + 0.03 * class as f64);
    let centre = (side as f64 - 1.0) / 2.0 + rng.gen_range(-1.0..1.0);
    let mut pixels = Vec::with_capacity(side * side * channels);

    for y in 0..side {
        for x in 0..side {
            let d = ((y as f64 - centre).powi(2) + (x as f64 - centre).powi(2)).sqrt();
            let darken = if d < radius { 0.55 } else { 1.0 };
            for c in 0..channels {
                let base = if channels == 1 {
                    tint.iter().sum::<f64>() / 3.0
                } else {
                    tint[c]
                };
                let v = base * darken + rng.gen_range(-12.0..12.0);
                pixels.push(v.clamp(0.0, 255.0).round() as u8);
            }
        }
    }
    pixels
}

/// One HMNIST table: `pixel0000 … pixelNNNN, label`, rows shuffled.
fn write_pixel_csv(
    path: &Path,
    side: usize,
    channels: usize,
    per_class: usize,
    rng: &mut ChaCha8Rng,
) -> Result<usize> {
    let n_pixels = side * side * channels;
    let mut rows: Vec<(usize, Vec<u8>)> = (0..CLASSES.len())
        .flat_map(|class| std::iter::repeat(class).take(per_class))
        .map(|class| (class, Vec::new()))
        .collect();
    for (class, pixels) in rows.iter_mut() {
        *pixels = synth_image(side, channels, *class, rng);
    }
    rows.shuffle(rng);

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut header: Vec<String> = (0..n_pixels).map(|i| format!("pixel{i:04}")).collect();
    header.push("label".to_string());
    writer.write_record(&header)?;
    for (class, pixels) in &rows {
        let mut record: Vec<String> = pixels.iter().map(u8::to_string).collect();
        record.push(class.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

struct MetadataRow {
    lesion_id: String,
    image_id: String,
    dx: &'static str,
    dx_type: &'static str,
    age: Option<f64>,
    sex: &'static str,
    localization: &'static str,
}

fn synth_metadata(rows: usize, rng: &mut ChaCha8Rng) -> Vec<MetadataRow> {
    (0..rows)
        .map(|i| {
            // nv dominates the real distribution.
            let dx = if rng.gen_bool(0.6) {
                "nv"
            } else {
                CLASSES[rng.gen_range(0..CLASSES.len())]
            };
            MetadataRow {
                lesion_id: format!("HAM_{:07}", i / 2),
                image_id: format!("ISIC_{:07}", 24306 + i),
                dx,
                dx_type: DX_TYPES[rng.gen_range(0..DX_TYPES.len())],
                age: (!rng.gen_bool(0.05)).then(|| (rng.gen_range(0..18) * 5) as f64),
                sex: SEXES[rng.gen_range(0..SEXES.len())],
                localization: SITES[rng.gen_range(0..SITES.len())],
            }
        })
        .collect()
}

fn write_metadata_csv(path: &Path, rows: &[MetadataRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record([
        "lesion_id",
        "image_id",
        "dx",
        "dx_type",
        "age",
        "sex",
        "localization",
    ])?;
    for r in rows {
        let age = r.age.map(|a| a.to_string()).unwrap_or_default();
        writer.write_record([
            r.lesion_id.as_str(),
            r.image_id.as_str(),
            r.dx,
            r.dx_type,
            age.as_str(),
            r.sex,
            r.localization,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_metadata_parquet(path: &Path, rows: &[MetadataRow]) -> Result<()> {
    let text = |f: fn(&MetadataRow) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let schema = Arc::new(Schema::new(vec![
        Field::new("lesion_id", DataType::Utf8, false),
        Field::new("image_id", DataType::Utf8, false),
        Field::new("dx", DataType::Utf8, false),
        Field::new("dx_type", DataType::Utf8, false),
        Field::new("age", DataType::Float64, true),
        Field::new("sex", DataType::Utf8, false),
        Field::new("localization", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            text(|r| r.lesion_id.as_str()),
            text(|r| r.image_id.as_str()),
            text(|r| r.dx),
            text(|r| r.dx_type),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.age).collect::<Vec<_>>())),
            text(|r| r.sex),
            text(|r| r.localization),
        ],
    )
    .context("Failed to create RecordBatch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    for (side, channels, suffix) in [(8, 1, "8_8_L"), (8, 3, "8_8_RGB"), (28, 1, "28_28_L"), (28, 3, "28_28_RGB")] {
        let path = args.out_dir.join(format!("hmnist_{suffix}.csv"));
        let rows = write_pixel_csv(&path, side, channels, args.per_class, &mut rng)?;
        println!(
            "Wrote {rows} images ({side}×{side}×{channels}) to {}",
            path.display()
        );
    }

    let metadata = synth_metadata(args.metadata_rows, &mut rng);
    let csv_path = args.out_dir.join("HAM10000_metadata.csv");
    write_metadata_csv(&csv_path, &metadata)?;
    let parquet_path = args.out_dir.join("HAM10000_metadata.parquet");
    write_metadata_parquet(&parquet_path, &metadata)?;
    println!(
        "Wrote {} metadata rows to {} and {}",
        metadata.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
