use clap::Parser;
use std::path::PathBuf;
use tilegen::{WorldGenerationParams, generate_world, save_preview_png};
use tracing_subscriber::EnvFilter;

/// Генератор тайловых миров по сиду
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML (по умолчанию: встроенные параметры)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Сид мира; перекрывает значение из конфигурации
    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Путь для сохранения превью (по умолчанию: ./world.png)
    #[arg(short, long, default_value = "world.png")]
    output: PathBuf,

    /// Путь для JSON-сводки генерации
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Размер клетки в пикселях
    #[arg(long, default_value_t = 8)]
    scale: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    println!("🔍 Загрузка конфигурации...");
    let mut params = match &cli.config {
        Some(path) => WorldGenerationParams::from_toml_file(path)?,
        None => WorldGenerationParams::default(),
    };
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }
    if let Some(width) = cli.width {
        params.width = width;
    }
    if let Some(height) = cli.height {
        params.height = height;
    }

    println!(
        "Генерация мира (сид: {}, размер: {}×{})...",
        params.seed, params.width, params.height
    );
    let world = generate_world(&params)?;

    println!("Сохранение в {:?}", cli.output);
    save_preview_png(&world, cli.scale, &cli.output)?;

    if let Some(path) = &cli.report {
        println!("Сохранение сводки в {path:?}");
        std::fs::write(path, serde_json::to_string_pretty(&world.report)?)?;
    }

    println!(
        "\nГотово! Дорог: {} компонент(а), мостов: {}, поселение: {}.",
        world.report.road_components,
        world.report.bridges.rectangles.len(),
        if world.report.settlement.record().is_some() { "есть" } else { "нет" }
    );
    Ok(())
}
