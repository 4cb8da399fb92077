use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Band-major multi-band samples (band x row x col)
pub type RasterCube = Array3<f64>;

/// Single band samples (row x col)
pub type RasterBand = Array2<f64>;

/// 8-bit band-major image (band x row x col)
pub type ImageCube = Array3<u8>;

/// Which of the two inputs a raster plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterRole {
    /// Multi-band optical imagery in a projected CRS
    Color,
    /// Single-band elevation surface, usually geographic
    Elevation,
}

impl std::fmt::Display for RasterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterRole::Color => write!(f, "color"),
            RasterRole::Elevation => write!(f, "elevation"),
        }
    }
}

/// Geographic extent in the units of some CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Geospatial transformation parameters (GDAL ordering)
///
/// `x = top_left_x + col * pixel_width + row * rotation_x`
/// `y = top_left_y + col * rotation_y + row * pixel_height`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Map fractional pixel coordinates to ground coordinates
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Inverse affine, mapping ground coordinates back to (col, row)
    pub fn invert(&self) -> FusionResult<GeoTransform> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return Err(FusionError::Geometry(format!(
                "Geotransform is not invertible: {:?}",
                self
            )));
        }

        let inv_a = self.pixel_height / det;
        let inv_b = -self.rotation_x / det;
        let inv_d = -self.rotation_y / det;
        let inv_e = self.pixel_width / det;

        Ok(GeoTransform {
            top_left_x: -(inv_a * self.top_left_x + inv_b * self.top_left_y),
            pixel_width: inv_a,
            rotation_x: inv_b,
            top_left_y: -(inv_d * self.top_left_x + inv_e * self.top_left_y),
            rotation_y: inv_d,
            pixel_height: inv_e,
        })
    }

    /// Ground extent covered by a raster of the given size
    pub fn extent(&self, width: usize, height: usize) -> BoundingBox {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(0.0, h),
            self.apply(w, h),
        ];

        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            bbox.min_x = bbox.min_x.min(x);
            bbox.max_x = bbox.max_x.max(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }

    pub fn is_north_up(&self) -> bool {
        self.rotation_x == 0.0 && self.rotation_y == 0.0 && self.pixel_height < 0.0
    }
}

/// Orthogonal, north-up grid shared by every aligned output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationGrid {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    /// CRS of the grid as WKT
    pub crs_wkt: String,
}

impl DestinationGrid {
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Ground coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    pub fn resolution(&self) -> (f64, f64) {
        (self.transform.pixel_width, -self.transform.pixel_height)
    }
}

/// Pipeline stage, used to report where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Read,
    Align,
    Normalize,
    Fuse,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Read => write!(f, "read"),
            PipelineStage::Align => write!(f, "align"),
            PipelineStage::Normalize => write!(f, "normalize"),
            PipelineStage::Fuse => write!(f, "fuse"),
        }
    }
}

/// Error types for alignment and fusion
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    #[error("Failed to read {role} raster: {message}")]
    Read { role: RasterRole, message: String },

    #[error("CRS error on {role} raster: {message}")]
    Crs { role: RasterRole, message: String },

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Numeric error: {0}")]
    Numeric(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<FusionError>,
    },
}

impl FusionError {
    pub fn read(role: RasterRole, message: impl Into<String>) -> Self {
        FusionError::Read {
            role,
            message: message.into(),
        }
    }

    pub fn crs(role: RasterRole, message: impl Into<String>) -> Self {
        FusionError::Crs {
            role,
            message: message.into(),
        }
    }

    /// Tag an error with the pipeline stage it came from
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        FusionError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Stage the error was raised in, if it went through the pipeline
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            FusionError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type for alignment and fusion operations
pub type FusionResult<T> = Result<T, FusionError>;
