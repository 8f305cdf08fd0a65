use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;

use clap::Parser;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

use patchwork::database::{Array, Database};
use patchwork::field::{Field, FieldDescriptor, MeshLocation};
use patchwork::index::{PatchEdge, PatchIndex};
use patchwork::serializer::MemorySerializer;




/// Geometry of a two-level test mesh: the unit square tiled by 4x4 blocks at
/// level 0, with the central 2x2 region of blocks replaced by its level-1
/// children.
struct Mesh {
    block_size: usize,
}

impl Mesh {
    fn cell_spacing(&self, level: i32) -> f64 {
        1.0 / (4.0 * self.block_size as f64 * f64::powi(2.0, level))
    }

    fn cell_center(&self, index: PatchIndex, zone: (usize, usize)) -> (f64, f64) {
        let dx = self.cell_spacing(index.level);
        let bs = self.block_size as f64;
        let x = (index.i as f64 * bs + zone.0 as f64 + 0.5) * dx;
        let y = (index.j as f64 * bs + zone.1 as f64 + 0.5) * dx;
        (x, y)
    }

    fn patch_indexes(&self) -> Vec<PatchIndex> {
        let mut indexes = Vec::new();

        for i in 0..4 {
            for j in 0..4 {
                if !(1..3).contains(&i) || !(1..3).contains(&j) {
                    indexes.push(PatchIndex::new(i, j, 0, Field::Conserved));
                }
            }
        }
        for i in 2..6 {
            for j in 2..6 {
                indexes.push(PatchIndex::new(i, j, 1, Field::Conserved));
            }
        }
        indexes
    }
}




/// Advect a gaussian pulse across a two-level mesh held in a patch database
#[derive(Parser)]
#[command(version)]
struct Opts {
    /// Number of cells per block, per direction
    #[arg(short = 'b', long, default_value_t = 16)]
    block_size: usize,

    /// CFL number
    #[arg(long, default_value_t = 0.4)]
    cfl: f64,

    /// Time to stop the simulation
    #[arg(short = 't', long, default_value_t = 0.2)]
    tfinal: f64,

    /// Number of iterations between log messages
    #[arg(short = 'f', long, default_value_t = 50)]
    fold: u64,

    /// File to write the assembled fine-level region to
    #[arg(short = 'o', long, default_value = "advect.json")]
    outfile: String,
}




// ============================================================================
fn main() -> Result<(), Box<dyn Error>> {
    let opts = Opts::parse();

    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let mesh = Mesh { block_size: opts.block_size };
    let header = BTreeMap::from([
        (Field::Conserved, FieldDescriptor::new(1, MeshLocation::Cell)),
    ]);
    let mut database = Database::new(opts.block_size, opts.block_size, header);

    for index in mesh.patch_indexes() {
        let initial = Array::from_shape_fn((opts.block_size, opts.block_size, 1), |(a, b, _)| {
            let (x, y) = mesh.cell_center(index, (a, b));
            f64::exp(-((x - 0.3).powi(2) + (y - 0.3).powi(2)) / 0.005)
        });
        database.insert(index, initial)?;
    }

    database.set_boundary_value(|_, edge, depth, patch| {
        let (ni, nj, num) = patch.dim();
        match edge {
            PatchEdge::Il | PatchEdge::Ir => Array::zeros((depth, nj, num)),
            PatchEdge::Jl | PatchEdge::Jr => Array::zeros((ni, depth, num)),
        }
    });

    let indexes = mesh.patch_indexes();
    let dt = opts.cfl * mesh.cell_spacing(1) / 2.0;
    let mut time = 0.0;
    let mut iteration = 0u64;

    info!("advecting {} patches to t={}", indexes.len(), opts.tfinal);

    while time < opts.tfinal {

        // Two-stage update: overwrite with the predictor, then blend the
        // corrector halfway into it.
        for rk_factor in [0.0, 0.5] {
            let mut updates = Vec::new();

            for &index in &indexes {
                let u = database.fetch(index, 1)?;
                let lam = dt / mesh.cell_spacing(index.level);
                let bs = opts.block_size;

                let du = Array::from_shape_fn((bs, bs, 1), |(a, b, f)| {
                    let c = u[[a + 1, b + 1, f]];
                    c - lam * (c - u[[a, b + 1, f]]) - lam * (c - u[[a + 1, b, f]])
                });
                updates.push((index, du));
            }
            for (index, du) in updates {
                database.commit(index, du, rk_factor)?;
            }
        }
        time += dt;
        iteration += 1;

        if iteration % opts.fold == 0 {
            let mass: f64 = database
                .iter()
                .map(|(index, u)| u.sum() * mesh.cell_spacing(index.level).powi(2))
                .sum();
            info!("[{:05}] t={:.4} total mass={:.6e}", iteration, time, mass);
        }
    }

    let fine = database.assemble(2..6, 2..6, 1, Field::Conserved)?;
    serde_json::to_writer(File::create(&opts.outfile)?, &fine)?;
    info!("wrote {}", opts.outfile);

    let mut ser = MemorySerializer::new();
    database.dump(&mut ser)?;
    let copy = Database::load(&ser, &[], None)?;
    info!("round tripped {} patches through the memory serializer", copy.len());

    Ok(())
}
