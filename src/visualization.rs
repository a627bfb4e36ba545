//! Trend chart rendering

use plotters::prelude::*;

use crate::driver::TickSample;

/// Render the PV/SP/LCV trend to a PNG, the chart the display layer would
/// draw live.
pub fn render_trend_chart(
    samples: &[TickSample],
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, (1024, 640)).into_drawing_area();
    root.fill(&WHITE)?;

    let t_min = samples.first().map(|s| s.elapsed).unwrap_or(0.0);
    let t_max = samples.last().map(|s| s.elapsed).unwrap_or(1.0).max(t_min + 1e-3);

    let mut chart = ChartBuilder::on(&root)
        .caption("Level Control Trend", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(t_min..t_max, 0.0..100.0)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Percent of span")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            samples.iter().map(|s| (s.elapsed, s.process_variable)),
            &GREEN,
        ))?
        .label("PV")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

    chart
        .draw_series(LineSeries::new(
            samples.iter().map(|s| (s.elapsed, s.setpoint)),
            &RED,
        ))?
        .label("SP")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .draw_series(LineSeries::new(
            samples.iter().map(|s| (s.elapsed, s.control_output)),
            &BLUE,
        ))?
        .label("LCV")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()?;

    root.present()?;
    Ok(())
}
