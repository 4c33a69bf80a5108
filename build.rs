use schema::{RarityTable, SpeciesCatalog};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=data");
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("generated_data.rs");
    let mut file = BufWriter::new(fs::File::create(&dest_path)?);

    let data_dir = Path::new("data");
    generate_rarity_table(&mut file, data_dir)?;
    generate_species_catalog(&mut file, data_dir)?;

    file.flush()?;
    Ok(())
}

fn generate_rarity_table(
    file: &mut BufWriter<fs::File>,
    data_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(data_dir.join("rarity.ron"))?;
    let table: RarityTable = ron::from_str(&content)?;

    // A name listed under two tiers keeps the rarer one.
    let mut seen = HashSet::new();
    let mut map = phf_codegen::Map::new();
    let tiers = [
        (&table.legendary, "RarityTier::Legendary"),
        (&table.rare, "RarityTier::Rare"),
        (&table.uncommon, "RarityTier::Uncommon"),
    ];
    for (names, tier) in tiers {
        for name in names {
            let key = name.trim().to_lowercase();
            if seen.insert(key.clone()) {
                map.entry(key, tier);
            }
        }
    }

    writeln!(
        file,
        "pub(crate) static RARITY_TABLE: phf::Map<&'static str, RarityTier> = {};",
        map.build()
    )?;
    writeln!(file)?;
    Ok(())
}

fn generate_species_catalog(
    file: &mut BufWriter<fs::File>,
    data_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(data_dir.join("species.ron"))?;
    let catalog: SpeciesCatalog = ron::from_str(&content)?;

    let mut ids = HashSet::new();
    for species in &catalog.species {
        if !ids.insert(species.id) {
            return Err(format!("duplicate species id {} ({})", species.id, species.name).into());
        }
    }

    let bytes = postcard::to_allocvec(&catalog)?;
    writeln!(file, "pub(crate) static CATALOG_BYTES: &[u8] = &{:?};", bytes)?;
    Ok(())
}
