//! Dataset contract and the list-file backed dataset.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::DatasetFlags;
use crate::error::{NeuralStereoError, Result};

use super::sample::{normalize_channels, StereoSample, CHANNELS};

/// Random-access source of stereo samples.
///
/// `get` receives a generator seeded per item and epoch by the loader, so
/// augmentation is reproducible regardless of worker scheduling.
pub trait StereoDataset: Send + Sync {
    /// Number of samples.
    fn len(&self) -> usize;

    /// Whether the dataset holds no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load sample `index`, cropped to the dataset's output shape.
    fn get(&self, index: usize, rng: &mut StdRng) -> Result<StereoSample>;
}

/// Directory layout of a dataset root, selected from the dataset flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetLayout {
    /// `image_2/`, `image_3/`, `disp_occ_0/`, `disp_occ_1/`.
    Kitti2015,
    /// `colored_0/`, `colored_1/`, `disp_occ/`.
    Kitti,
    /// `left/`, `right/`, `disparity/`.
    Satellite,
    /// List entries are left-image paths under `frames_finalpass/`; PFM
    /// disparity lives at the same path under `disparity/`.
    SceneFlow,
}

/// Files making up one list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
    /// Left image.
    pub left: PathBuf,
    /// Right image.
    pub right: PathBuf,
    /// Left-view disparity.
    pub disparity: PathBuf,
    /// Right-view disparity, if the layout provides one.
    pub right_disparity: Option<PathBuf>,
}

impl DatasetLayout {
    /// Layout for a combination of dataset flags. KITTI 2015 wins over KITTI,
    /// which wins over satellite.
    pub fn from_flags(flags: DatasetFlags) -> Self {
        if flags.kitti2015 {
            DatasetLayout::Kitti2015
        } else if flags.kitti {
            DatasetLayout::Kitti
        } else if flags.satellite {
            DatasetLayout::Satellite
        } else {
            DatasetLayout::SceneFlow
        }
    }

    /// Whether right-view ground truth exists, which view mirroring needs.
    pub fn has_right_disparity(self) -> bool {
        matches!(self, DatasetLayout::Kitti2015 | DatasetLayout::SceneFlow)
    }

    /// Resolve the files of a list entry under `root`.
    pub fn paths(self, root: &Path, entry: &str) -> EntryPaths {
        match self {
            DatasetLayout::Kitti2015 => EntryPaths {
                left: root.join("image_2").join(entry),
                right: root.join("image_3").join(entry),
                disparity: root.join("disp_occ_0").join(entry),
                right_disparity: Some(root.join("disp_occ_1").join(entry)),
            },
            DatasetLayout::Kitti => EntryPaths {
                left: root.join("colored_0").join(entry),
                right: root.join("colored_1").join(entry),
                disparity: root.join("disp_occ").join(entry),
                right_disparity: None,
            },
            DatasetLayout::Satellite => EntryPaths {
                left: root.join("left").join(entry),
                right: root.join("right").join(entry),
                disparity: root.join("disparity").join(entry),
                right_disparity: None,
            },
            DatasetLayout::SceneFlow => {
                let disparity = Path::new(&entry.replacen("frames_finalpass", "disparity", 1))
                    .with_extension("pfm");
                let disparity = disparity.to_string_lossy().into_owned();
                EntryPaths {
                    left: root.join(entry),
                    right: root.join(entry.replace("/left/", "/right/")),
                    disparity: root.join(&disparity),
                    right_disparity: Some(root.join(disparity.replace("/left/", "/right/"))),
                }
            }
        }
    }
}

/// How samples are cropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Random crop, optional random shift and view mirroring.
    Train {
        /// Maximum horizontal shift of the right window.
        shift: usize,
        /// Randomly use the mirrored right view.
        left_right: bool,
    },
    /// Deterministic bottom-right crop with zero padding.
    Test,
}

/// Dataset reading entries from a list file relative to a root directory.
#[derive(Debug, Clone)]
pub struct ListDataset {
    root: PathBuf,
    entries: Vec<String>,
    layout: DatasetLayout,
    crop: [usize; 2],
    mode: SampleMode,
}

impl ListDataset {
    /// Create a dataset over explicit entries.
    pub fn new(
        root: impl Into<PathBuf>,
        entries: Vec<String>,
        layout: DatasetLayout,
        crop: [usize; 2],
        mode: SampleMode,
    ) -> Result<Self> {
        if crop[0] == 0 || crop[1] == 0 {
            return Err(NeuralStereoError::invalid_config("crop shape must be positive"));
        }
        if let SampleMode::Train { shift, left_right } = mode {
            if shift >= crop[1] {
                return Err(NeuralStereoError::invalid_config(
                    "shift must be smaller than the crop width",
                ));
            }
            if left_right && !layout.has_right_disparity() {
                return Err(NeuralStereoError::invalid_config(format!(
                    "left_right needs right-view disparity, which the {:?} layout lacks",
                    layout
                )));
            }
        }

        Ok(Self {
            root: root.into(),
            entries,
            layout,
            crop,
            mode,
        })
    }

    /// Directory layout in use.
    pub fn layout(&self) -> DatasetLayout {
        self.layout
    }

    /// List entries, in file order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    fn load_full(&self, paths: &EntryPaths) -> Result<StereoSample> {
        let (left, h, w) = load_image(&paths.left)?;
        let (right, rh, rw) = load_image(&paths.right)?;
        if (rh, rw) != (h, w) {
            return Err(NeuralStereoError::InvalidData(format!(
                "{} is {}x{}, its left view is {}x{}",
                paths.right.display(),
                rh,
                rw,
                h,
                w
            )));
        }
        let disparity = load_disparity_checked(&paths.disparity, h, w)?;
        StereoSample::new(left, right, disparity, h, w)
    }
}

impl StereoDataset for ListDataset {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize, rng: &mut StdRng) -> Result<StereoSample> {
        let entry = self.entries.get(index).ok_or_else(|| {
            NeuralStereoError::dataset(format!(
                "index {} out of range for {} entries",
                index,
                self.entries.len()
            ))
        })?;
        let paths = self.layout.paths(&self.root, entry);
        let mut sample = self.load_full(&paths)?;
        let [crop_h, crop_w] = self.crop;

        match self.mode {
            SampleMode::Test => Ok(sample.crop_bottom_right(crop_h, crop_w)),
            SampleMode::Train { shift, left_right } => {
                if left_right && rng.gen_bool(0.5) {
                    if let Some(path) = &paths.right_disparity {
                        let right_disp = load_disparity_checked(path, sample.height, sample.width)?;
                        sample = sample.mirror_views(right_disp)?;
                    }
                }

                let s = if shift > 0 { rng.gen_range(0..=shift) } else { 0 };
                let [h, w] = sample.shape();
                let y0 = random_offset(rng, h, crop_h);
                let x0 = random_offset(rng, w.saturating_sub(s), crop_w);
                Ok(sample.crop(y0, x0, s, crop_h, crop_w))
            }
        }
    }
}

/// Uniform crop offset in `[0, size - crop]`, or the bottom/right anchored
/// negative offset when the image is smaller than the crop.
fn random_offset(rng: &mut StdRng, size: usize, crop: usize) -> isize {
    if size > crop {
        rng.gen_range(0..=size - crop) as isize
    } else {
        size as isize - crop as isize
    }
}

/// Training dataset: random crops with shift augmentation.
pub fn get_training_set(
    root: impl AsRef<Path>,
    list_file: impl AsRef<Path>,
    crop_shape: [usize; 2],
    left_right: bool,
    flags: DatasetFlags,
    shift: usize,
) -> Result<ListDataset> {
    let entries = read_list(list_file.as_ref())?;
    ListDataset::new(
        root.as_ref(),
        entries,
        DatasetLayout::from_flags(flags),
        crop_shape,
        SampleMode::Train { shift, left_right },
    )
}

/// Validation dataset: deterministic bottom-right crops.
///
/// `left_right` is accepted for symmetry with [`get_training_set`]; test
/// samples are never mirrored.
pub fn get_test_set(
    root: impl AsRef<Path>,
    list_file: impl AsRef<Path>,
    crop_shape: [usize; 2],
    left_right: bool,
    flags: DatasetFlags,
) -> Result<ListDataset> {
    if left_right {
        log::debug!("left_right has no effect on the test set");
    }
    let entries = read_list(list_file.as_ref())?;
    ListDataset::new(
        root.as_ref(),
        entries,
        DatasetLayout::from_flags(flags),
        crop_shape,
        SampleMode::Test,
    )
}

/// Read a list file: one entry per line, blank lines ignored.
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| {
        NeuralStereoError::dataset(format!("cannot read list file {}: {}", path.display(), e))
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Load an RGB image as normalized planar CHW values.
fn load_image(path: &Path) -> Result<(Vec<f32>, usize, usize)> {
    let rgb = image::open(path)?.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let plane = h * w;

    let mut chw = vec![0.0f32; CHANNELS * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..CHANNELS {
            chw[c * plane + i] = pixel.0[c] as f32;
        }
    }
    normalize_channels(&mut chw, CHANNELS);

    Ok((chw, h, w))
}

fn load_disparity_checked(path: &Path, height: usize, width: usize) -> Result<Vec<f32>> {
    let (disparity, h, w) = load_disparity(path)?;
    if (h, w) != (height, width) {
        return Err(NeuralStereoError::InvalidData(format!(
            "{} is {}x{}, expected {}x{}",
            path.display(),
            h,
            w,
            height,
            width
        )));
    }
    Ok(disparity)
}

/// Load a disparity map: PFM as stored, other formats as 16-bit values / 256.
pub fn load_disparity(path: &Path) -> Result<(Vec<f32>, usize, usize)> {
    let is_pfm = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pfm"));
    if is_pfm {
        return read_pfm(path);
    }

    let gray = image::open(path)?.to_luma16();
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let disparity = gray.pixels().map(|p| p.0[0] as f32 / 256.0).collect();
    Ok((disparity, h, w))
}

/// Read a PFM file, returning the first channel in top-to-bottom row order.
pub fn read_pfm(path: &Path) -> Result<(Vec<f32>, usize, usize)> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let channels = match next_token(&mut reader)?.as_str() {
        "Pf" => 1,
        "PF" => 3,
        other => {
            return Err(NeuralStereoError::InvalidData(format!(
                "{}: not a PFM file (header '{}')",
                path.display(),
                other
            )))
        }
    };
    let width: usize = parse_token(&mut reader, path)?;
    let height: usize = parse_token(&mut reader, path)?;
    let scale: f32 = parse_token(&mut reader, path)?;
    let little_endian = scale < 0.0;

    let byte_len = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels * 4))
        .filter(|&n| n as u64 <= file_len)
        .ok_or_else(|| {
            NeuralStereoError::InvalidData(format!(
                "{}: PFM size {}x{} does not match the file",
                path.display(),
                width,
                height
            ))
        })?;

    let mut raw = vec![0u8; byte_len];
    reader.read_exact(&mut raw)?;

    let mut out = vec![0.0f32; byte_len / (channels * 4)];
    for (i, bytes) in raw.chunks_exact(4).step_by(channels).enumerate() {
        let bytes = [bytes[0], bytes[1], bytes[2], bytes[3]];
        let value = if little_endian {
            f32::from_le_bytes(bytes)
        } else {
            f32::from_be_bytes(bytes)
        };
        // Rows are stored bottom to top.
        let (row, col) = (i / width, i % width);
        out[(height - 1 - row) * width + col] = value;
    }

    Ok((out, height, width))
}

/// Next whitespace-delimited header token. Consumes exactly one trailing
/// whitespace byte, so the binary payload starts right after it.
fn next_token<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut token = String::new();
    let mut byte = [0u8; 1];
    loop {
        if reader.read(&mut byte)? == 0 {
            break;
        }
        let c = byte[0] as char;
        if c.is_ascii_whitespace() {
            if token.is_empty() {
                continue;
            }
            break;
        }
        token.push(c);
    }
    Ok(token)
}

fn parse_token<R: BufRead, T: std::str::FromStr>(reader: &mut R, path: &Path) -> Result<T> {
    let token = next_token(reader)?;
    token.parse().map_err(|_| {
        NeuralStereoError::InvalidData(format!("{}: bad PFM header value '{}'", path.display(), token))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::io::Write;

    fn write_pfm(path: &Path, width: usize, height: usize, rows_top_down: &[f32]) {
        let mut file = File::create(path).unwrap();
        write!(file, "Pf\n{} {}\n-1.0\n", width, height).unwrap();
        for row in rows_top_down.chunks(width).rev() {
            for v in row {
                file.write_all(&v.to_le_bytes()).unwrap();
            }
        }
    }

    fn write_rgb(path: &Path, width: u32, height: u32) {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 10) as u8, 128])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_read_pfm_flips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.pfm");
        write_pfm(&path, 2, 2, &[1.0, 2.0, 3.0, 4.0]);

        let (values, h, w) = read_pfm(&path).unwrap();
        assert_eq!((h, w), (2, 2));
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_read_pfm_rejects_other_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pfm");
        fs::write(&path, b"P6\n1 1\n255\n\0\0\0").unwrap();
        assert!(matches!(read_pfm(&path), Err(NeuralStereoError::InvalidData(_))));
    }

    #[test]
    fn test_read_pfm_rejects_oversized_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.pfm");
        let header = format!("Pf\n{} {}\n-1.0\n", usize::MAX / 2, 3);
        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(read_pfm(&path), Err(NeuralStereoError::InvalidData(_))));

        let path = dir.path().join("short.pfm");
        fs::write(&path, b"Pf\n1000 1000\n-1.0\n\0\0\0\0").unwrap();
        assert!(matches!(read_pfm(&path), Err(NeuralStereoError::InvalidData(_))));
    }

    #[test]
    fn test_png_disparity_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.png");
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_vec(2, 1, vec![512, 0])
            .unwrap();
        img.save(&path).unwrap();

        let (values, h, w) = load_disparity(&path).unwrap();
        assert_eq!((h, w), (1, 2));
        assert_eq!(values, vec![2.0, 0.0]);
    }

    #[test]
    fn test_layout_paths() {
        let root = Path::new("/data");
        let kitti = DatasetLayout::Kitti.paths(root, "000001_10.png");
        assert_eq!(kitti.left, PathBuf::from("/data/colored_0/000001_10.png"));
        assert_eq!(kitti.disparity, PathBuf::from("/data/disp_occ/000001_10.png"));
        assert!(kitti.right_disparity.is_none());

        let sf = DatasetLayout::SceneFlow.paths(root, "frames_finalpass/TRAIN/A/0000/left/0006.png");
        assert_eq!(sf.right, PathBuf::from("/data/frames_finalpass/TRAIN/A/0000/right/0006.png"));
        assert_eq!(sf.disparity, PathBuf::from("/data/disparity/TRAIN/A/0000/left/0006.pfm"));
        assert_eq!(
            sf.right_disparity,
            Some(PathBuf::from("/data/disparity/TRAIN/A/0000/right/0006.pfm"))
        );
    }

    #[test]
    fn test_layout_from_flags() {
        let flags = DatasetFlags {
            kitti: true,
            kitti2015: true,
            satellite: true,
        };
        assert_eq!(DatasetLayout::from_flags(flags), DatasetLayout::Kitti2015);
        assert_eq!(DatasetLayout::from_flags(DatasetFlags::default()), DatasetLayout::SceneFlow);
    }

    #[test]
    fn test_left_right_requires_right_disparity() {
        let result = ListDataset::new(
            "/data",
            vec![],
            DatasetLayout::Kitti,
            [4, 4],
            SampleMode::Train {
                shift: 0,
                left_right: true,
            },
        );
        assert!(matches!(result, Err(NeuralStereoError::InvalidConfig { .. })));
    }

    #[test]
    fn test_satellite_train_and_test_crops() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["left", "right", "disparity"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
        }
        write_rgb(&dir.path().join("left/a.png"), 6, 4);
        write_rgb(&dir.path().join("right/a.png"), 6, 4);
        let disp = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_vec(
            6,
            4,
            vec![256 * 3; 24],
        )
        .unwrap();
        disp.save(dir.path().join("disparity/a.png")).unwrap();
        let list = dir.path().join("list.txt");
        fs::write(&list, "a.png\n\n").unwrap();

        let flags = DatasetFlags {
            satellite: true,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);

        let train = get_training_set(dir.path(), &list, [2, 3], false, flags, 1).unwrap();
        assert_eq!(train.len(), 1);
        let sample = train.get(0, &mut rng).unwrap();
        assert_eq!(sample.shape(), [2, 3]);
        assert!(sample.disparity.iter().all(|&d| d == 3.0 || d == 4.0));

        let test = get_test_set(dir.path(), &list, [5, 8], false, flags).unwrap();
        let sample = test.get(0, &mut rng).unwrap();
        assert_eq!(sample.shape(), [5, 8]);
        // One padded row on top, two padded columns on the left.
        assert_eq!(sample.disparity[0], 0.0);
        assert_eq!(sample.disparity[8 + 1], 0.0);
        assert_eq!(sample.disparity[8 + 2], 3.0);

        assert!(train.get(1, &mut rng).is_err());
    }
}
