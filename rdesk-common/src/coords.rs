//! Viewport → remote-display coordinate mapping, with letterbox/pillarbox
//! handling. Deliberately free of any pointer-listener type: this module is
//! a pure function of its inputs plus the caller-supplied UI offset.

/// The local viewport rectangle a pointer sample is reported against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The remote display's pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteDisplay {
    pub width: u32,
    pub height: u32,
}

/// Maps one local-viewport pointer sample to server-display coordinates, or
/// `None` if the point falls outside the viewport or inside a letterbox /
/// pillarbox pad region.
pub fn map_point(
    local_x: f64,
    local_y: f64,
    viewport: Viewport,
    display: RemoteDisplay,
    ui_offset_y: i32,
) -> Option<(i32, i32)> {
    if local_x < viewport.x
        || local_y < viewport.y
        || local_x >= viewport.x + viewport.width
        || local_y >= viewport.y + viewport.height
        || viewport.width <= 0.0
        || viewport.height <= 0.0
    {
        return None;
    }

    let rx = local_x - viewport.x;
    let ry = local_y - viewport.y;

    let server_w = display.width as f64;
    let server_h = display.height as f64;
    let server_ar = server_w / server_h;
    let view_ar = viewport.width / viewport.height;

    let (mut sx, mut sy) = if server_ar > view_ar {
        // Letterbox: image is horizontally full, vertically padded.
        let effective_h = viewport.width / server_ar;
        let pad_v = (viewport.height - effective_h) / 2.0;
        if ry < pad_v || ry > viewport.height - pad_v {
            return None;
        }
        let sx = (rx * server_w / viewport.width).round();
        let sy = ((ry - pad_v) * server_h / effective_h).round();
        (sx, sy)
    } else {
        // Pillarbox: image is vertically full, horizontally padded.
        let effective_w = viewport.height * server_ar;
        let pad_h = (viewport.width - effective_w) / 2.0;
        if rx < pad_h || rx > viewport.width - pad_h {
            return None;
        }
        let sx = ((rx - pad_h) * server_w / effective_w).round();
        let sy = (ry * server_h / viewport.height).round();
        (sx, sy)
    };

    sy += ui_offset_y as f64;

    sx = sx.clamp(0.0, server_w - 1.0);
    sy = sy.clamp(0.0, server_h - 1.0);

    Some((sx as i32, sy as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_point_maps_within_a_pixel_of_center() {
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 600.0,
        };
        let display = RemoteDisplay {
            width: 800,
            height: 600,
        };
        let (sx, sy) = map_point(400.0, 300.0, viewport, display, 0).unwrap();
        assert!((sx - 400).abs() <= 1);
        assert!((sy - 300).abs() <= 1);
    }

    #[test]
    fn letterbox_pad_region_is_dropped() {
        // Spec §8 scenario 5: 1600x900 server, 800x600 viewport, point at (400, 10).
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 600.0,
        };
        let display = RemoteDisplay {
            width: 1600,
            height: 900,
        };
        assert_eq!(map_point(400.0, 10.0, viewport, display, 0), None);
    }

    #[test]
    fn letterbox_center_maps_correctly() {
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 600.0,
        };
        let display = RemoteDisplay {
            width: 1600,
            height: 900,
        };
        // Center of the viewport should map close to the center of the display.
        let (sx, sy) = map_point(400.0, 300.0, viewport, display, 0).unwrap();
        assert!((sx - 800).abs() <= 1);
        assert!((sy - 450).abs() <= 1);
    }

    #[test]
    fn pillarbox_pad_region_is_dropped() {
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 600.0,
        };
        // Server AR (0.6) <= viewport AR (1.33): pillarbox case.
        let display = RemoteDisplay {
            width: 480,
            height: 800,
        };
        assert_eq!(map_point(10.0, 300.0, viewport, display, 0), None);
    }

    #[test]
    fn outside_viewport_is_dropped() {
        let viewport = Viewport {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 200.0,
        };
        let display = RemoteDisplay {
            width: 1920,
            height: 1080,
        };
        assert_eq!(map_point(0.0, 0.0, viewport, display, 0), None);
    }

    #[test]
    fn ui_offset_shifts_y_and_clamps_to_bounds() {
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 600.0,
        };
        let display = RemoteDisplay {
            width: 800,
            height: 600,
        };
        let (_, sy) = map_point(400.0, 599.0, viewport, display, 1000).unwrap();
        assert_eq!(sy, 599); // clamped to height - 1
    }
}
