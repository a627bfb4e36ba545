use tank_level_sim::{ControllerTuning, LoopDriver, NoNoise, ProcessParameters};

#[test]
fn load_disturbance_shifts_controller_output() {
    let run = |load: f64| {
        let params = ProcessParameters {
            load,
            ..ProcessParameters::default()
        };
        let mut driver =
            LoopDriver::new(ControllerTuning::default(), params, 46.7681, Box::new(NoNoise))
                .expect("valid configuration");
        driver.start();
        for _ in 0..20 {
            driver.tick(0.1);
        }
        driver.snapshot()
    };

    let baseline = run(0.0);
    let disturbed = run(10.0);
    assert!(
        disturbed.control_output - baseline.control_output > 1.0,
        "A positive load should push the output up before the integral compensates"
    );
    assert!(disturbed.process_variable > baseline.process_variable);
}
