//! Connected-component labeling over a pixel predicate.

use image::RgbImage;

use super::color::is_selection_red;

/// Components with a smaller bounding box are treated as noise.
pub const MIN_MARKER_BBOX_AREA: u64 = 100;
/// A component filling less than this share of its bounding box is an outline.
pub const BORDER_FILL_RATIO_MAX: f64 = 0.50;

/// A 4-connected region with its bounding box and coordinate sums.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    pub pixel_count: u64,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
    pub sum_x: u64,
    pub sum_y: u64,
}

impl Component {
    fn seed(x: u32, y: u32) -> Self {
        Self {
            pixel_count: 0,
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
            sum_x: 0,
            sum_y: 0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.pixel_count += 1;
        self.sum_x += x as u64;
        self.sum_y += y as u64;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn bbox_width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn bbox_height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn bbox_area(&self) -> u64 {
        self.bbox_width() as u64 * self.bbox_height() as u64
    }

    pub fn fill_ratio(&self) -> f64 {
        self.pixel_count as f64 / self.bbox_area() as f64
    }

    /// Mean pixel position.
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.pixel_count.max(1) as f64;
        (self.sum_x as f64 / n, self.sum_y as f64 / n)
    }

    /// Specks and resampling fringes, too small to be a marker or a cell.
    pub fn is_noise(&self) -> bool {
        self.bbox_area() < MIN_MARKER_BBOX_AREA
    }

    /// Large enough to not be noise and hollow enough to be a rectangle outline.
    pub fn is_border_marker(&self) -> bool {
        !self.is_noise() && self.fill_ratio() < BORDER_FILL_RATIO_MAX
    }
}

/// Labels 4-connected regions of pixels where `is_member(x, y)` holds.
///
/// Uses an explicit stack. Results are sorted by pixel count, largest first;
/// equal sizes keep raster-scan order.
pub fn find_components<F>(width: u32, height: u32, is_member: F) -> Vec<Component>
where
    F: Fn(u32, u32) -> bool,
{
    let (w, h) = (width as usize, height as usize);
    let mut visited = vec![false; w * h];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if visited[start] {
            continue;
        }
        let (sx, sy) = ((start % w) as u32, (start / w) as u32);
        if !is_member(sx, sy) {
            continue;
        }

        let mut component = Component::seed(sx, sy);
        visited[start] = true;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            let (x, y) = ((idx % w) as u32, (idx / w) as u32);
            component.add(x, y);

            let neighbours = [
                (x > 0).then(|| idx - 1),
                (x + 1 < width).then(|| idx + 1),
                (y > 0).then(|| idx - w),
                (y + 1 < height).then(|| idx + w),
            ];
            for ni in neighbours.into_iter().flatten() {
                if visited[ni] {
                    continue;
                }
                if !is_member((ni % w) as u32, (ni / w) as u32) {
                    continue;
                }
                visited[ni] = true;
                stack.push(ni);
            }
        }

        components.push(component);
    }

    components.sort_by(|a, b| b.pixel_count.cmp(&a.pixel_count));
    components
}

/// Components of selection-red pixels.
pub fn find_red_components(img: &RgbImage) -> Vec<Component> {
    find_components(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        is_selection_red(p[0], p[1], p[2])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn mask(rows: &[&str]) -> (u32, u32, Vec<Vec<bool>>) {
        let cells: Vec<Vec<bool>> = rows
            .iter()
            .map(|r| r.chars().map(|c| c == '#').collect())
            .collect();
        (cells[0].len() as u32, cells.len() as u32, cells)
    }

    #[test]
    fn test_two_blobs() {
        let (w, h, cells) = mask(&[
            "##.....",
            "##...#.",
            "##...##",
            ".....#.",
        ]);
        let comps = find_components(w, h, |x, y| cells[y as usize][x as usize]);

        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].pixel_count, 6);
        assert_eq!((comps[0].min_x, comps[0].max_x, comps[0].min_y, comps[0].max_y), (0, 1, 0, 2));
        assert_eq!(comps[0].centroid(), (0.5, 1.0));

        assert_eq!(comps[1].pixel_count, 4);
        assert_eq!((comps[1].min_x, comps[1].max_x, comps[1].min_y, comps[1].max_y), (5, 6, 1, 3));
    }

    #[test]
    fn test_diagonal_pixels_are_separate() {
        let (w, h, cells) = mask(&["#.", ".#"]);
        let comps = find_components(w, h, |x, y| cells[y as usize][x as usize]);
        assert_eq!(comps.len(), 2);
        assert!(comps.iter().all(|c| c.pixel_count == 1));
    }

    #[test]
    fn test_snake_is_one_component() {
        let (w, h, cells) = mask(&[
            "#####",
            "....#",
            "#####",
            "#....",
            "#####",
        ]);
        let comps = find_components(w, h, |x, y| cells[y as usize][x as usize]);
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].pixel_count, 17);
    }

    #[test]
    fn test_fill_ratio_classification() {
        let mut outline = Component::seed(0, 0);
        outline.max_x = 19;
        outline.max_y = 19;
        outline.pixel_count = 120;
        assert!((outline.fill_ratio() - 0.3).abs() < 1e-9);
        assert!(outline.is_border_marker());

        let mut filled = outline.clone();
        filled.pixel_count = 380;
        assert!((filled.fill_ratio() - 0.95).abs() < 1e-9);
        assert!(!filled.is_border_marker());
    }

    #[test]
    fn test_tiny_outline_is_noise() {
        let mut tiny = Component::seed(0, 0);
        tiny.max_x = 8;
        tiny.max_y = 8;
        tiny.pixel_count = 20;
        assert!(tiny.bbox_area() < MIN_MARKER_BBOX_AREA);
        assert!(tiny.is_noise());
        assert!(!tiny.is_border_marker());
    }

    #[test]
    fn test_red_components_on_image() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        for x in 2..5 {
            img.put_pixel(x, 2, Rgb([220, 40, 40]));
        }
        // Pink is not selection red
        img.put_pixel(8, 8, Rgb([240, 110, 110]));

        let comps = find_red_components(&img);
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].pixel_count, 3);
    }
}
