use fx_metrics::ServiceMetrics;
use prometheus::CounterVec;
use fx_types::RealtimeResponse;

/// Add every datum in `resp` to the service's counters.
pub fn process(resp: &RealtimeResponse, service_id: &str, service_name: &str, m: &ServiceMetrics) {
    for datum in &resp.data {
        for (dc, s) in &datum.datacenter {
            let labels = [service_id, service_name, dc.as_str()];
            let add = |c: &CounterVec, v: f64| c.with_label_values(&labels).inc_by(v);
            add(&m.requests_total, s.requests as f64);
            add(&m.hits_total, s.hits as f64);
            add(&m.miss_total, s.miss as f64);
            add(&m.pass_total, s.pass as f64);
            add(&m.errors_total, s.errors as f64);
            add(&m.synth_total, s.synth as f64);
            add(&m.hits_time_total, s.hits_time);
            add(&m.miss_time_total, s.miss_time);
            add(&m.req_header_bytes_total, s.req_header_bytes as f64);
            add(&m.req_body_bytes_total, s.req_body_bytes as f64);
            add(&m.resp_header_bytes_total, s.resp_header_bytes as f64);
            add(&m.resp_body_bytes_total, s.resp_body_bytes as f64);
            add(&m.bereq_header_bytes_total, s.bereq_header_bytes as f64);
            add(&m.bereq_body_bytes_total, s.bereq_body_bytes as f64);
            for (group, n) in s.status_groups() {
                m.status_group_total
                    .with_label_values(&[service_id, service_name, dc.as_str(), group])
                    .inc_by(n as f64);
            }
            for (code, n) in s.status_codes() {
                m.status_code_total
                    .with_label_values(&[service_id, service_name, dc.as_str(), code])
                    .inc_by(n as f64);
            }
        }
    }
}
