use clap::{Parser, Subcommand};
use log::info;
use terrain_tin::{
    check::check_topology,
    clip_to_polygon, delta_between, delta_to_elevation,
    io::{
        read_geojson_dataset, read_landxml_surface, read_points_csv, write_geojson_dataset,
        write_landxml_surface,
    },
    join_features_with, volumes_to_elevation, volumes_within, ClipMode, FeatureType, JoinOptions, Result,
    TinError, TinSettings, Volumes,
};

/// Command line front end for terrain surface editing.
#[derive(Parser)]
#[command(name = "terrain_tin_cli", version)]
struct Cli {
    /// JSON file with engine settings; omitted keys keep their defaults
    #[arg(long, global = true)]
    settings: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print point, triangle and feature counts and the planimetric area of a LandXML surface.
    Info { path: String },
    /// Clip a LandXML surface with a CSV boundary of x,y pairs.
    Clip {
        input: String,
        boundary: String,
        output: String,
        /// Remove the inside of the boundary instead of keeping it
        #[arg(long)]
        external: bool,
    },
    /// Write the elevation difference `a - b` of two LandXML surfaces.
    Delta {
        a: String,
        b: String,
        output: String,
        /// Optional CSV region limiting the result
        #[arg(long)]
        region: Option<String>,
    },
    /// Subtract a constant elevation from a LandXML surface.
    DeltaElevation {
        input: String,
        elevation: f64,
        output: String,
        /// Optional CSV region the surface is clipped to first
        #[arg(long)]
        region: Option<String>,
    },
    /// Print cut and fill volumes of a LandXML surface against a constant elevation.
    Volume {
        input: String,
        elevation: f64,
        /// Optional CSV region limiting the calculation
        #[arg(long)]
        region: Option<String>,
    },
    /// Join fragmented linear features of a GeoJSON data set.
    Join {
        input: String,
        output: String,
        #[arg(long, default_value = "breakline")]
        feature_type: String,
        #[arg(long, default_value_t = 0.01)]
        tolerance: f64,
        /// Type given to the joined features
        #[arg(long)]
        output_type: Option<String>,
    },
    /// Run the topology integrity check on a LandXML surface.
    Check { path: String },
}

fn parse_type(name: &str) -> Result<FeatureType> {
    name.parse::<FeatureType>().map_err(TinError::Validation)
}

fn print_volumes(volumes: &Volumes) {
    println!("Cut: {:.3} over {:.3}", volumes.cut, volumes.cut_area);
    println!("Fill: {:.3} over {:.3}", volumes.fill, volumes.fill_area);
    println!("Balance: {:.3}", volumes.balance());
}

fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.settings {
        Some(path) => {
            info!("loading settings from {path}");
            TinSettings::from_json_file(path)?
        }
        None => TinSettings::default(),
    };
    match cli.command {
        Commands::Info { path } => {
            let mesh = read_landxml_surface(&path, &settings)?;
            println!("Points: {}", mesh.point_count());
            println!("Triangles: {}", mesh.triangle_count());
            for t in FeatureType::ALL {
                let n = mesh.count_features(t);
                if n > 0 {
                    println!("{}: {}", t.name(), n);
                }
            }
            println!("Area: {:.3}", mesh.area());
            println!("Surface area: {:.3}", mesh.surface_area()?);
        }
        Commands::Clip {
            input,
            boundary,
            output,
            external,
        } => {
            let mut mesh = read_landxml_surface(&input, &settings)?;
            let boundary = read_points_csv(&boundary)?;
            let mode = if external {
                ClipMode::External
            } else {
                ClipMode::Internal
            };
            clip_to_polygon(&mut mesh, &boundary, mode)?;
            write_landxml_surface(&output, &mesh)?;
            println!("Clipped surface has {} triangles", mesh.triangle_count());
        }
        Commands::Delta { a, b, output, region } => {
            let a = read_landxml_surface(&a, &settings)?;
            let b = read_landxml_surface(&b, &settings)?;
            let region = region.map(|r| read_points_csv(&r)).transpose()?;
            let delta = delta_between(&a, &b, region.as_deref())?;
            write_landxml_surface(&output, &delta.mesh)?;
            println!(
                "Delta surface has {} points ({} unlocated, {} unmerged)",
                delta.mesh.point_count(),
                delta.unlocated,
                delta.merge_failures
            );
            print_volumes(&delta.volumes()?);
        }
        Commands::DeltaElevation {
            input,
            elevation,
            output,
            region,
        } => {
            let mut mesh = read_landxml_surface(&input, &settings)?;
            let region = region.map(|r| read_points_csv(&r)).transpose()?;
            delta_to_elevation(&mut mesh, elevation, region.as_deref())?;
            write_landxml_surface(&output, &mesh)?;
            println!("Delta surface has {} points", mesh.point_count());
        }
        Commands::Volume {
            input,
            elevation,
            region,
        } => {
            let mesh = read_landxml_surface(&input, &settings)?;
            let volumes = match region {
                Some(r) => volumes_within(&mesh, elevation, &read_points_csv(&r)?)?,
                None => volumes_to_elevation(&mesh, elevation)?,
            };
            print_volumes(&volumes);
        }
        Commands::Join {
            input,
            output,
            feature_type,
            tolerance,
            output_type,
        } => {
            let mut data = read_geojson_dataset(&input)?;
            let options = JoinOptions {
                output_type: output_type.as_deref().map(parse_type).transpose()?,
            };
            let report = join_features_with(&mut data, parse_type(&feature_type)?, tolerance, &options)?;
            write_geojson_dataset(&output, &data)?;
            println!("Before: {}", report.before);
            println!("After: {}", report.after);
        }
        Commands::Check { path } => {
            let mesh = read_landxml_surface(&path, &settings)?;
            check_topology(&mesh)?;
            println!("Topology OK");
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
