use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    const fn hex(value: u32) -> Rgb {
        Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    fn lerp(self, other: Rgb, s: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + s * (b as f64 - a as f64)).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

const VIRIDIS: [Rgb; 5] = [
    Rgb::hex(0x440154),
    Rgb::hex(0x3b528b),
    Rgb::hex(0x21918c),
    Rgb::hex(0x5ec962),
    Rgb::hex(0xfde725),
];

const REDS: [Rgb; 5] = [
    Rgb::hex(0xfff5f0),
    Rgb::hex(0xfcbba1),
    Rgb::hex(0xfb6a4a),
    Rgb::hex(0xcb181d),
    Rgb::hex(0x67000d),
];

const RD_PU: [Rgb; 9] = [
    Rgb::hex(0xfff7f3),
    Rgb::hex(0xfde0dd),
    Rgb::hex(0xfcc5c0),
    Rgb::hex(0xfa9fb5),
    Rgb::hex(0xf768a1),
    Rgb::hex(0xdd3497),
    Rgb::hex(0xae017e),
    Rgb::hex(0x7a0177),
    Rgb::hex(0x49006a),
];

/// Heart-rate zones 1-5.
const ZONES: [Rgb; 5] = [
    Rgb::hex(0xffffcc),
    Rgb::hex(0xa1dab4),
    Rgb::hex(0x41b6c4),
    Rgb::hex(0x2c7fb8),
    Rgb::hex(0x253494),
];

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Palette {
    #[default]
    Viridis,
    Reds,
    RdPu,
    /// Categorical; no interpolation between stops.
    Zones,
}

impl Palette {
    fn stops(&self) -> &'static [Rgb] {
        match self {
            Palette::Viridis => &VIRIDIS,
            Palette::Reds => &REDS,
            Palette::RdPu => &RD_PU,
            Palette::Zones => &ZONES,
        }
    }

    /// Color at `t` in `[0, 1]` (clamped).
    pub fn color(&self, t: f64) -> Rgb {
        let stops = self.stops();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let last = stops.len() - 1;
        if *self == Palette::Zones {
            return stops[(t * last as f64).round() as usize];
        }
        let seg = t * last as f64;
        let i = (seg as usize).min(last - 1);
        stops[i].lerp(stops[i + 1], seg - i as f64)
    }

    /// Color for band `band` out of `num_bands`.
    pub fn band_color(&self, band: usize, num_bands: usize) -> Rgb {
        if num_bands <= 1 {
            return self.color(0.0);
        }
        self.color(band as f64 / (num_bands - 1) as f64)
    }
}
