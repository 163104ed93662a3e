use eyre::Result;
use plotters::{
    coord::Shift,
    element::{DynElement, IntoDynElement},
    prelude::*,
};

use crate::{observation::Implementation, plot::Canvas};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Square,
    Diamond,
    TriangleUp,
    TriangleDown,
    Plus,
    Cross,
    Star,
    Pentagon,
}

/// Visual identity of one kernel, identical in every subplot and legend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStyle {
    pub color: RGBColor,
    pub marker: Marker,
}

const STYLES: [(Implementation, SeriesStyle); 9] = [
    (Implementation::Zcx, style(0x8c, 0x56, 0x4b, Marker::Pentagon)),
    (Implementation::Bsmr, style(0x1f, 0x77, 0xb4, Marker::Circle)),
    (Implementation::FlashSparse, style(0xd6, 0x27, 0x28, Marker::Square)),
    (Implementation::RoDe, style(0x94, 0x67, 0xbd, Marker::Diamond)),
    (Implementation::Aspt, style(0xf0, 0xe4, 0x42, Marker::TriangleUp)),
    (Implementation::CuSddmm, style(0x17, 0xbe, 0xcf, Marker::TriangleDown)),
    (Implementation::CuSparse, style(0x2c, 0xa0, 0x2c, Marker::Plus)),
    (Implementation::Tcgnn, style(0xff, 0x7f, 0x0e, Marker::Cross)),
    (Implementation::Sputnik, style(0xe3, 0x77, 0xc2, Marker::Star)),
];

const fn style(r: u8, g: u8, b: u8, marker: Marker) -> SeriesStyle {
    SeriesStyle {
        color: RGBColor(r, g, b),
        marker,
    }
}

impl SeriesStyle {
    pub fn of(implementation: Implementation) -> SeriesStyle {
        STYLES
            .iter()
            .find(|(imp, _)| *imp == implementation)
            .map(|(_, style)| *style)
            .unwrap_or(style(0, 0, 0, Marker::Circle))
    }

    pub fn line(&self, alpha: f64, width: u32) -> ShapeStyle {
        self.color.mix(alpha).stroke_width(width)
    }

    pub fn fill(&self, alpha: f64) -> ShapeStyle {
        self.color.mix(alpha).filled()
    }
}

fn regular_polygon(corners: usize, radius: f64, inner: Option<f64>) -> Vec<(i32, i32)> {
    let points = if inner.is_some() { corners * 2 } else { corners };
    (0..points)
        .map(|i| {
            let r = match inner {
                Some(inner) if i % 2 == 1 => inner,
                _ => radius,
            };
            let angle = -std::f64::consts::FRAC_PI_2
                + i as f64 * 2.0 * std::f64::consts::PI / points as f64;
            ((r * angle.cos()).round() as i32, (r * angle.sin()).round() as i32)
        })
        .collect()
}

/// A marker glyph of radius `size` pixels centred on `coord`.
pub fn marker_element<'a, DB, C>(
    marker: Marker,
    coord: C,
    size: i32,
    style: ShapeStyle,
) -> DynElement<'a, DB, C>
where
    DB: DrawingBackend + 'a,
    C: Clone + 'a,
{
    let anchor = EmptyElement::at(coord);
    let s = size;
    let r = size as f64;
    match marker {
        Marker::Circle => (anchor + Circle::new((0, 0), s, style)).into_dyn(),
        Marker::Square => (anchor + Rectangle::new([(-s, -s), (s, s)], style)).into_dyn(),
        Marker::Diamond => {
            (anchor + Polygon::new(vec![(0, -s), (s, 0), (0, s), (-s, 0)], style)).into_dyn()
        }
        Marker::TriangleUp => {
            (anchor + Polygon::new(regular_polygon(3, r, None), style)).into_dyn()
        }
        Marker::TriangleDown => {
            let points = regular_polygon(3, r, None)
                .into_iter()
                .map(|(x, y)| (x, -y))
                .collect::<Vec<_>>();
            (anchor + Polygon::new(points, style)).into_dyn()
        }
        Marker::Plus => {
            let t = (s / 3).max(1);
            let points = vec![
                (-t, -s),
                (t, -s),
                (t, -t),
                (s, -t),
                (s, t),
                (t, t),
                (t, s),
                (-t, s),
                (-t, t),
                (-s, t),
                (-s, -t),
                (-t, -t),
            ];
            (anchor + Polygon::new(points, style)).into_dyn()
        }
        Marker::Cross => (anchor + Cross::new((0, 0), s, style.stroke_width(2))).into_dyn(),
        Marker::Star => {
            (anchor + Polygon::new(regular_polygon(5, r, Some(r * 0.45)), style)).into_dyn()
        }
        Marker::Pentagon => {
            (anchor + Polygon::new(regular_polygon(5, r, None), style)).into_dyn()
        }
    }
}

/// Line swatch, marker and name of one kernel, for legends drawn by hand.
pub struct LegendEntry<'a> {
    pub alpha: f64,
    pub text: TextStyle<'a>,
    swatch: i32,
    gap: i32,
    marker_size: i32,
    line_width: u32,
}

impl<'a> LegendEntry<'a> {
    /// `text` should be anchored left and centred vertically.
    pub fn new(canvas: &Canvas, alpha: f64, text: TextStyle<'a>) -> Self {
        Self {
            alpha,
            text,
            swatch: canvas.pt(18.0) as i32,
            gap: canvas.pt(6.0) as i32,
            marker_size: canvas.pt(3.0) as i32,
            line_width: canvas.pt(1.0),
        }
    }

    pub fn width<DB>(&self, area: &DrawingArea<DB, Shift>, implementation: Implementation) -> Result<i32>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let (text, _) = area.estimate_text_size(implementation.name(), &self.text)?;
        Ok(self.swatch + self.gap + text as i32)
    }

    /// Draws the entry with its left edge at `x`, centred on `y`.
    pub fn draw<DB>(
        &self,
        area: &DrawingArea<DB, Shift>,
        implementation: Implementation,
        (x, y): (i32, i32),
    ) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let style = SeriesStyle::of(implementation);
        area.draw(&PathElement::new(
            vec![(x, y), (x + self.swatch, y)],
            style.line(self.alpha, self.line_width),
        ))?;
        area.draw(&marker_element(
            style.marker,
            (x + self.swatch / 2, y),
            self.marker_size,
            style.fill(self.alpha),
        ))?;
        area.draw(&Text::new(
            implementation.name(),
            (x + self.swatch + self.gap, y),
            self.text.clone(),
        ))?;
        Ok(())
    }
}
