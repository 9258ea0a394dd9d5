use clap::Parser;
use clap::ValueEnum;
use psl_map::I64I64Table;
use psl_map::StrLimits;
use psl_map::StrTable;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyKind {
    /// Sequential i64 keys, hashed by identity.
    Int,
    /// Random i64 keys, hashed by identity.
    RandomInt,
    /// Formatted byte-string keys.
    Bytes,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'n', long = "entries", default_value_t = 1000)]
    entries: usize,

    #[arg(short = 'k', long = "keys", value_enum, default_value_t = KeyKind::Bytes)]
    keys: KeyKind,

    /// Fraction of entries deleted again after filling.
    #[arg(short = 'd', long = "delete_fraction", default_value_t = 0.0)]
    delete_fraction: f64,

    #[arg(short = 's', long = "seed", default_value_t = 7)]
    seed: u64,
}

fn main() {
    let args = Args::parse();
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let deletions = (args.entries as f64 * args.delete_fraction.clamp(0.0, 1.0)) as usize;

    println!(
        "Filling a {:?} table with {} entries, then deleting {}",
        args.keys, args.entries, deletions
    );

    let stats = match args.keys {
        KeyKind::Int | KeyKind::RandomInt => {
            let keys: Vec<i64> = match args.keys {
                KeyKind::RandomInt => (0..args.entries).map(|_| rng.random()).collect(),
                _ => (0..args.entries as i64).collect(),
            };

            let mut table = I64I64Table::default();
            for &key in &keys {
                table.set(key, key).unwrap();
            }
            for &key in &keys[..deletions] {
                table.delete(key).unwrap();
            }
            println!("Table holds {} entries", table.len());
            table.stats()
        }
        KeyKind::Bytes => {
            let keys: Vec<String> = (0..args.entries)
                .map(|i| format!("key_{:016X}", i as u64 * 0x9E37_79B9))
                .collect();

            let mut table = StrTable::with_limits(StrLimits::new(32, 8), &mut rng).unwrap();
            for (i, key) in keys.iter().enumerate() {
                table.set(key.as_bytes(), &(i as u64).to_le_bytes()).unwrap();
            }
            for key in &keys[..deletions] {
                table.delete(key.as_bytes()).unwrap();
            }
            println!("Table holds {} entries", table.len());
            table.stats()
        }
    };

    stats.print();
}
