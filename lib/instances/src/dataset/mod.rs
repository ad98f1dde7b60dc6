use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use crate::Error;
use fnv::FnvHashSet;
use std::borrow::Cow;


pub trait IdxNameMap {
  fn index_to_name(&self, idx: usize) -> Result<Cow<str>>;

  fn name_to_index(&self, name: &str) -> Result<usize>;

  fn len(&self) -> usize;

  fn check_idx(&self, idx: usize) -> Result<()> {
    if self.len() <= idx {
      Err(Error::IndexOutOfRange.into())
    } else {
      Ok(())
    }
  }
}


impl<'a, D: IdxNameMap> IdxNameMap for &'a D {
  fn index_to_name(&self, idx: usize) -> Result<Cow<str>> {
    D::index_to_name(self, idx)
  }

  fn name_to_index(&self, name: &str) -> Result<usize> {
    D::name_to_index(self, name)
  }

  fn len(&self) -> usize {
    D::len(self)
  }
}

pub trait Dataset: IdxNameMap + Sync {
  type Instance;
  fn load_instance(&self, idx: usize) -> Result<Self::Instance>;
}


impl<'a, D: Dataset> Dataset for &'a D {
  type Instance = D::Instance;

  fn load_instance(&self, idx: usize) -> Result<Self::Instance> {
    D::load_instance(self, idx)
  }
}


/// A directory of instance files matched by a glob pattern, ordered by path.  Instances are named
/// by file stem.  If the path given is a single file, the dataset contains just that file.
///
/// Relative directories are resolved against `DATA_ROOT` when that environment variable is set.
pub struct DirLayout<D> {
  _marker: PhantomData<D>,
  name_order: Vec<PathBuf>,
  name_to_idx_map: HashMap<String, usize>,
}

impl<D> DirLayout<D> {
  pub fn new(dir: impl AsRef<Path>, patt: &str) -> Result<Self> {
    let dir = dir.as_ref();
    let dir = match std::env::var_os("DATA_ROOT") {
      Some(root) if dir.is_relative() && !dir.exists() => Path::new(&root).join(dir),
      _ => dir.to_path_buf(),
    };

    let name_order = if dir.is_file() {
      vec![dir]
    } else {
      let ctx = format!("try read directory {:?}", &dir);
      let dir = dir.canonicalize().context(ctx)?;
      let mut p = dir.to_string_lossy().into_owned();
      p.push('/');
      p.push_str(patt);

      let names: std::result::Result<Vec<PathBuf>, _> = glob::glob(&p)?.collect();
      let mut names = names?;
      names.retain(|p| p.is_file());
      names.sort();
      names
    };

    let name_to_idx_map: Result<HashMap<_, _>> = name_order.iter()
      .enumerate()
      .map(|(k, p)| {
        let n = p.file_stem().ok_or_else(|| anyhow::anyhow!("missing file stem: {:?}", p))?;
        Ok((n.to_string_lossy().into_owned(), k))
      })
      .collect();
    let name_to_idx_map = name_to_idx_map?;
    Ok(DirLayout {
      _marker: Default::default(),
      name_order,
      name_to_idx_map
    })
  }

  pub fn path(&self, idx: usize) -> Result<&Path> {
    self.name_order.get(idx)
      .map(PathBuf::as_path)
      .ok_or_else(|| Error::IndexOutOfRange.into())
  }
}

impl<D> IdxNameMap for DirLayout<D> {
  fn index_to_name(&self, idx: usize) -> Result<Cow<str>> {
    self.check_idx(idx)?;
    let name = self.name_order[idx].file_stem()
      .ok_or_else(|| anyhow::anyhow!("missing file stem for idx {}", idx))?;
    Ok(name.to_string_lossy())
  }

  fn name_to_index(&self, name: &str) -> Result<usize> {
    let idx = *self.name_to_idx_map.get(name).ok_or(Error::UnknownInstanceName)?;
    Ok(idx)
  }

  fn len(&self) -> usize { self.name_order.len() }
}


pub struct Subset<D> {
  dataset: D,
  indices: Vec<usize>,
  index_set: FnvHashSet<usize>,
}

impl<D: IdxNameMap> Subset<D> {
  pub fn new(dataset: D, indices: Vec<usize>) -> Result<Self> {
    for &i in &indices {
      dataset.check_idx(i).with_context(|| format!("index {} out of range (0..{})", i, dataset.len()))?;
    }
    let index_set: FnvHashSet<_> = indices.iter().cloned().collect();
    if index_set.len() != indices.len() {
      anyhow::bail!("indices must be unique")
    }
    Ok(Subset { dataset, indices, index_set })
  }

  fn map_index(&self, idx: usize) -> Result<usize> {
    self.indices.get(idx).copied().ok_or_else(|| Error::IndexOutOfRange.into())
  }
}

impl<D: IdxNameMap> IdxNameMap for Subset<D> {
  fn name_to_index(&self, name: &str) -> Result<usize> {
    let idx = self.dataset.name_to_index(name)?;
    match self.indices.iter().position(|&i| i == idx) {
      Some(k) if self.index_set.contains(&idx) => Ok(k),
      _ => Err(Error::UnknownInstanceName.into()),
    }
  }

  fn index_to_name(&self, idx: usize) -> Result<Cow<str>> {
    self.dataset.index_to_name(self.map_index(idx)?)
  }

  fn len(&self) -> usize { self.indices.len() }
}

impl<I, D: Dataset<Instance=I>> Dataset for Subset<D> {
  type Instance = I;
  fn load_instance(&self, idx: usize) -> Result<I> {
    self.dataset.load_instance(self.map_index(idx)?)
  }
}


pub mod tsp;
