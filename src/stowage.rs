use std::{
    collections::BTreeMap,
    fs::{create_dir_all, remove_dir_all, remove_file, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, Trim};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use tqdm::Iter;
use tracing::{debug, info};

use crate::{
    errors::{FieldmapError, Result},
    graph::Graph,
    pipeline::{CountryReport, Summary},
    records::{Snapshot, SnapshotMeta},
};

pub const FIELDS: &str = "fields";
pub const SUBFIELDS: &str = "subfields";
pub const TOPICS: &str = "topics";
pub const COUNTRY_TOTALS: &str = "country_totals";
pub const COUNTRY_COUNTS: &str = "country_counts";
pub const YEARLY_COUNTS: &str = "yearly_counts";
pub const TOP_PAPERS: &str = "top_papers";
pub const FUNDERS: &str = "funders";
pub const META: &str = "meta.json";

pub const SPECIALIZATION: &str = "specialization";
pub const SUMMARY: &str = "summary";

macro_rules! pathfields_fn {
    ($($k:ident => $v:literal),*,) => {

        pub fn new<P: AsRef<Path>>(root_path: P) -> io::Result<Self> {
            $(
                let $k = root_path.as_ref().join($v);
                create_dir_all(&$k)?;
            )*

            Ok(Self {
                $(
                    $k,
                )*
            })
        }
    };
}

/// `<root>/snapshot` is read, `<root>/artifacts` is written.
pub struct Stowage {
    pub snapshot: PathBuf,
    pub artifacts: PathBuf,
    pub graphs: PathBuf,
}

impl Stowage {
    pathfields_fn!(
        snapshot => "snapshot",
        artifacts => "artifacts",
        graphs => "artifacts/graphs",
    );

    /// `<name>.csv` or `<name>.csv.gz`. Absent optional tables read as empty.
    pub fn read_table<T>(&self, name: &str, required: bool) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let plain = self.snapshot.join(format!("{name}.csv"));
        let gz = self.snapshot.join(format!("{name}.csv.gz"));
        let reader: Box<dyn Read> = if plain.exists() {
            Box::new(File::open(&plain)?)
        } else if gz.exists() {
            Box::new(GzDecoder::new(File::open(&gz)?))
        } else if required {
            return Err(FieldmapError::MissingTable(name.to_string()));
        } else {
            debug!("no {} table, reading as empty", name);
            return Ok(Vec::new());
        };

        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .from_reader(BufReader::new(reader));
        let mut out = Vec::new();
        for row in rdr.deserialize::<T>().tqdm().desc(Some(name)) {
            out.push(row.map_err(|source| FieldmapError::Csv {
                table: name.to_string(),
                source,
            })?);
        }
        Ok(out)
    }

    pub fn read_meta(&self) -> Result<SnapshotMeta> {
        let path = self.snapshot.join(META);
        if !path.exists() {
            return Err(FieldmapError::MissingTable(META.to_string()));
        }
        read_json(&path)
    }

    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            meta: self.read_meta()?,
            fields: self.read_table(FIELDS, false)?,
            subfields: self.read_table(SUBFIELDS, true)?,
            topics: self.read_table(TOPICS, false)?,
            country_totals: self.read_table(COUNTRY_TOTALS, false)?,
            country_counts: self.read_table(COUNTRY_COUNTS, false)?,
            yearly_counts: self.read_table(YEARLY_COUNTS, false)?,
            top_papers: self.read_table(TOP_PAPERS, false)?,
            funders: self.read_table(FUNDERS, false)?,
        };
        info!(
            "loaded snapshot: {} subfields, {} topics, {} countries",
            snapshot.subfields.len(),
            snapshot.topics.len(),
            snapshot.country_totals.len()
        );
        Ok(snapshot)
    }

    /// Writes `<artifacts>/<rel>.json` (or `.json.gz`) and returns the path.
    /// A copy with the other extension is removed.
    pub fn write_artifact<T: Serialize>(&self, rel: &str, obj: &T, compress: bool) -> Result<PathBuf> {
        let (ext, other_ext) = if compress {
            ("json.gz", "json")
        } else {
            ("json", "json.gz")
        };
        let out_path = self.artifacts.join(format!("{rel}.{ext}"));
        if let Some(parent) = out_path.parent() {
            create_dir_all(parent)?;
        }
        let other_path = self.artifacts.join(format!("{rel}.{other_ext}"));
        if other_path.exists() {
            remove_file(&other_path)?;
        }
        let out_file = File::create(&out_path)?;
        if compress {
            let encoder = GzEncoder::new(out_file, Compression::default());
            let mut writer = BufWriter::new(encoder);
            serde_json::to_writer(&mut writer, obj).map_err(io::Error::from)?;
            writer.into_inner().map_err(|e| e.into_error())?.finish()?;
        } else {
            let mut writer = BufWriter::new(out_file);
            serde_json::to_writer(&mut writer, obj).map_err(io::Error::from)?;
            writer.flush()?;
        }
        debug!("wrote {}", out_path.display());
        Ok(out_path)
    }

    /// Reads back `<artifacts>/<rel>.json`, falling back to `.json.gz`.
    pub fn read_artifact<T: DeserializeOwned>(&self, rel: &str) -> Result<T> {
        let plain = self.artifacts.join(format!("{rel}.json"));
        if plain.exists() {
            return read_json(&plain);
        }
        let gz = self.artifacts.join(format!("{rel}.json.gz"));
        let mut raw = String::new();
        GzDecoder::new(File::open(&gz)?).read_to_string(&mut raw)?;
        parse_json(&raw, &gz)
    }

    /// Replaces everything under `artifacts/graphs`.
    pub fn write_graphs(&self, graphs: &[Graph], compress: bool) -> Result<()> {
        if self.graphs.exists() {
            remove_dir_all(&self.graphs)?;
        }
        create_dir_all(&self.graphs)?;
        for g in graphs.iter() {
            self.write_artifact(&graph_rel(g), g, compress)?;
        }
        info!("wrote {} graphs to {}", graphs.len(), self.graphs.display());
        Ok(())
    }

    pub fn write_reports(
        &self,
        reports: &BTreeMap<String, CountryReport>,
        compress: bool,
    ) -> Result<()> {
        let path = self.write_artifact(SPECIALIZATION, reports, compress)?;
        info!("wrote {} country reports to {}", reports.len(), path.display());
        Ok(())
    }

    pub fn write_summary(&self, summary: &Summary, compress: bool) -> Result<()> {
        let path = self.write_artifact(SUMMARY, summary, compress)?;
        info!("wrote summary to {}", path.display());
        Ok(())
    }
}

/// `graphs/<kind>/<parent id>`
pub fn graph_rel(graph: &Graph) -> String {
    format!("graphs/{}/{}", graph.scope.kind, graph.scope.parent_id)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    parse_json(&raw, path)
}

fn parse_json<T: DeserializeOwned>(raw: &str, path: &Path) -> Result<T> {
    let deserializer = &mut serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(deserializer).map_err(|source| FieldmapError::Json {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CountryTotal, Entity};

    fn write_gz_text(path: &Path, text: &str) {
        let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let stowage = Stowage::new(dir.path()).unwrap();
        assert!(stowage.snapshot.is_dir());
        assert!(stowage.graphs.is_dir());
    }

    #[test]
    fn reads_plain_and_gz_tables() {
        let dir = tempfile::tempdir().unwrap();
        let stowage = Stowage::new(dir.path()).unwrap();
        std::fs::write(
            stowage.snapshot.join("country_totals.csv"),
            "country_code,country_name,works_count\nUS, United States ,500\n",
        )
        .unwrap();
        write_gz_text(
            &stowage.snapshot.join("subfields.csv.gz"),
            "id,display_name,description,parent_id,works_count,global_works_count\n\
             https://openalex.org/subfields/3107,Optics,,https://openalex.org/fields/31,10,100\n",
        );
        let totals: Vec<CountryTotal> = stowage.read_table(COUNTRY_TOTALS, true).unwrap();
        assert_eq!(totals[0].country_name, "United States");
        let subfields: Vec<Entity> = stowage.read_table(SUBFIELDS, true).unwrap();
        assert_eq!(subfields[0].id, "3107");
        assert_eq!(subfields[0].parent_id.as_deref(), Some("31"));
    }

    #[test]
    fn missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let stowage = Stowage::new(dir.path()).unwrap();
        let topics: Vec<Entity> = stowage.read_table(TOPICS, false).unwrap();
        assert!(topics.is_empty());
        assert!(matches!(
            stowage.read_table::<Entity>(SUBFIELDS, true),
            Err(FieldmapError::MissingTable(_))
        ));
        assert!(matches!(
            stowage.load_snapshot(),
            Err(FieldmapError::MissingTable(_))
        ));
    }

    #[test]
    fn bad_rows_name_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let stowage = Stowage::new(dir.path()).unwrap();
        std::fs::write(
            stowage.snapshot.join("country_totals.csv"),
            "country_code,country_name,works_count\nUS,United States,many\n",
        )
        .unwrap();
        match stowage.read_table::<CountryTotal>(COUNTRY_TOTALS, true) {
            Err(FieldmapError::Csv { table, .. }) => assert_eq!(table, COUNTRY_TOTALS),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn meta_errors_carry_field_path() {
        let dir = tempfile::tempdir().unwrap();
        let stowage = Stowage::new(dir.path()).unwrap();
        std::fs::write(
            stowage.snapshot.join(META),
            r#"{"global_works_count": -3}"#,
        )
        .unwrap();
        match stowage.read_meta() {
            Err(FieldmapError::Json { source, .. }) => {
                assert_eq!(source.path().to_string(), "global_works_count")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn artifacts_plain_and_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let stowage = Stowage::new(dir.path()).unwrap();
        let obj = BTreeMap::from([("a".to_string(), vec![1u32, 2])]);

        let p = stowage.write_artifact("x/plain", &obj, false).unwrap();
        assert!(p.ends_with("x/plain.json"));
        let back: BTreeMap<String, Vec<u32>> = stowage.read_artifact("x/plain").unwrap();
        assert_eq!(back, obj);

        let p = stowage.write_artifact("packed", &obj, true).unwrap();
        assert!(p.ends_with("packed.json.gz"));
        let back: BTreeMap<String, Vec<u32>> = stowage.read_artifact("packed").unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn switching_compression_drops_old_copy() {
        let dir = tempfile::tempdir().unwrap();
        let stowage = Stowage::new(dir.path()).unwrap();
        let old = BTreeMap::from([("a".to_string(), 1u32)]);
        let new = BTreeMap::from([("a".to_string(), 2u32)]);

        stowage.write_artifact(SUMMARY, &old, false).unwrap();
        stowage.write_artifact(SUMMARY, &new, true).unwrap();
        assert!(!stowage.artifacts.join("summary.json").exists());
        let back: BTreeMap<String, u32> = stowage.read_artifact(SUMMARY).unwrap();
        assert_eq!(back, new);

        stowage.write_artifact(SUMMARY, &old, false).unwrap();
        assert!(!stowage.artifacts.join("summary.json.gz").exists());
    }
}
