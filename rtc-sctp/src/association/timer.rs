use std::time::{Duration, Instant};

pub(crate) const ACK_INTERVAL: u64 = 200;

const RTO_INITIAL: u64 = 3000; // msec
const RTO_MIN: u64 = 1000; // msec
const RTO_MAX: u64 = 60000; // msec
const RTO_ALPHA: u64 = 1;
const RTO_BETA: u64 = 2;
const RTO_BASE: u64 = 8;
const MAX_INIT_RETRANS: usize = 8;

/// Retransmission limits and RTO bounds of an association.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    /// Retransmissions of INIT and COOKIE ECHO before the handshake fails. `None` retries forever.
    pub max_init_retransmits: Option<usize>,
    /// Retransmissions of DATA, SHUTDOWN and RE-CONFIG before the association fails.
    /// `None` retries forever.
    pub max_data_retransmits: Option<usize>,
    pub rto_initial_ms: u64,
    pub rto_min_ms: u64,
    pub rto_max_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            max_init_retransmits: Some(MAX_INIT_RETRANS),
            max_data_retransmits: None,
            rto_initial_ms: RTO_INITIAL,
            rto_min_ms: RTO_MIN,
            rto_max_ms: RTO_MAX,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Timer {
    T1Init = 0,
    T1Cookie = 1,
    T2Shutdown = 2,
    T3RTX = 3,
    Reconfig = 4,
    Ack = 5,
}

impl Timer {
    pub(crate) const VALUES: [Self; Timer::COUNT] = [
        Timer::T1Init,
        Timer::T1Cookie,
        Timer::T2Shutdown,
        Timer::T3RTX,
        Timer::Reconfig,
        Timer::Ack,
    ];
    const COUNT: usize = 6;
}

/// A table of data associated with each distinct kind of `Timer`
#[derive(Debug, Copy, Clone)]
pub(crate) struct TimerTable {
    data: [Option<Instant>; Timer::COUNT],
    retrans: [usize; Timer::COUNT],
    max_retrans: [Option<usize>; Timer::COUNT],
}

impl TimerTable {
    pub(crate) fn new(config: &TimerConfig) -> Self {
        let mut max_retrans = [None; Timer::COUNT];
        max_retrans[Timer::T1Init as usize] = config.max_init_retransmits;
        max_retrans[Timer::T1Cookie as usize] = config.max_init_retransmits;
        max_retrans[Timer::T2Shutdown as usize] = config.max_data_retransmits;
        max_retrans[Timer::T3RTX as usize] = config.max_data_retransmits;
        max_retrans[Timer::Reconfig as usize] = config.max_data_retransmits;

        TimerTable {
            data: [None; Timer::COUNT],
            retrans: [0; Timer::COUNT],
            max_retrans,
        }
    }

    /// Arms the timer unless it is already running. Returns whether it was armed.
    pub(crate) fn start(&mut self, timer: Timer, now: Instant, interval: u64) -> bool {
        if self.data[timer as usize].is_some() {
            return false;
        }
        self.restart(timer, now, interval);
        true
    }

    /// Arms the timer with a back-off of `interval * 2^n` where n is the retransmission count.
    pub(crate) fn restart(&mut self, timer: Timer, now: Instant, interval: u64) {
        self.restart_capped(timer, now, interval, RTO_MAX);
    }

    pub(crate) fn restart_capped(&mut self, timer: Timer, now: Instant, interval: u64, cap: u64) {
        let interval = if timer == Timer::Ack {
            interval
        } else {
            calculate_next_timeout(interval, self.retrans[timer as usize], cap)
        };
        self.data[timer as usize] = Some(now + Duration::from_millis(interval));
    }

    pub(crate) fn is_expired(&self, timer: Timer, after: Instant) -> bool {
        self.data[timer as usize].is_some_and(|x| x <= after)
    }

    /// Stops the timer and clears its retransmission count.
    pub(crate) fn stop(&mut self, timer: Timer) {
        self.data[timer as usize] = None;
        self.retrans[timer as usize] = 0;
    }

    /// Records a timeout. Returns false when the retransmission limit was exceeded.
    pub(crate) fn on_expired(&mut self, timer: Timer) -> bool {
        self.data[timer as usize] = None;
        self.retrans[timer as usize] += 1;
        match self.max_retrans[timer as usize] {
            Some(max) => self.retrans[timer as usize] <= max,
            None => true,
        }
    }

    pub(crate) fn retrans(&self, timer: Timer) -> usize {
        self.retrans[timer as usize]
    }

    pub(crate) fn is_running(&self, timer: Timer) -> bool {
        self.data[timer as usize].is_some()
    }

    pub(crate) fn next_timeout(&self) -> Option<Instant> {
        self.data.iter().filter_map(|&x| x).min()
    }
}

fn calculate_next_timeout(rto: u64, n_rtos: usize, rto_max: u64) -> u64 {
    // RFC 4096 sec 6.3.3.  Handle T3-rtx Expiration
    //   E2)  For the destination address for which the timer expires, set RTO
    //        <- RTO * 2 ("back off the timer").  The maximum value discussed
    //        in rule C7 above (RTO.max) may be used to provide an upper bound
    //        to this doubling operation.
    if n_rtos < 31 {
        std::cmp::min(rto << n_rtos, rto_max)
    } else {
        rto_max
    }
}

/// rtoManager manages Rtx timeout values.
/// This is an implementation of RFC 4960 sec 6.3.1.
#[derive(Default, Debug)]
pub(crate) struct RtoManager {
    pub(crate) srtt: u64,
    pub(crate) rttvar: f64,
    pub(crate) rto: u64,
    pub(crate) no_update: bool,
    rto_min: u64,
    rto_max: u64,
}

impl RtoManager {
    pub(crate) fn new(config: &TimerConfig) -> Self {
        RtoManager {
            rto: config.rto_initial_ms,
            rto_min: config.rto_min_ms,
            rto_max: config.rto_max_ms,
            ..Default::default()
        }
    }

    /// Takes a newly measured RTT then adjust the RTO in msec.
    pub(crate) fn set_new_rtt(&mut self, rtt: u64) -> u64 {
        if self.no_update {
            return self.srtt;
        }

        if self.srtt == 0 {
            // First measurement
            self.srtt = rtt;
            self.rttvar = rtt as f64 / 2.0;
        } else {
            // Subsequent rtt measurement
            self.rttvar = ((RTO_BASE - RTO_BETA) as f64 * self.rttvar
                + RTO_BETA as f64 * (self.srtt as i64 - rtt as i64).abs() as f64)
                / RTO_BASE as f64;
            self.srtt = ((RTO_BASE - RTO_ALPHA) * self.srtt + RTO_ALPHA * rtt) / RTO_BASE;
        }

        self.rto = (self.srtt + (4.0 * self.rttvar) as u64).clamp(self.rto_min, self.rto_max);
        self.srtt
    }

    /// Current RTO in msec.
    pub(crate) fn get_rto(&self) -> u64 {
        self.rto
    }

    /// Upper bound used to cap exponential back-off.
    pub(crate) fn get_rto_max(&self) -> u64 {
        self.rto_max
    }

    /// Resets the RTO variables to the initial values.
    pub(crate) fn reset(&mut self, config: &TimerConfig) {
        if self.no_update {
            return;
        }

        self.srtt = 0;
        self.rttvar = 0.0;
        self.rto = config.rto_initial_ms;
    }

    /// Sets RTO value for testing
    pub(crate) fn set_rto(&mut self, rto: u64, no_update: bool) {
        self.rto = rto;
        self.no_update = no_update;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rto_manager_initial_values() {
        let m = RtoManager::new(&TimerConfig::default());
        assert_eq!(m.get_rto(), RTO_INITIAL);
        assert_eq!(m.srtt, 0);
        assert_eq!(m.rttvar, 0.0);
    }

    #[test]
    fn test_rto_manager_rto_calculation_small_rtt() {
        let mut m = RtoManager::new(&TimerConfig::default());
        let exp = [
            1800, 1500, 1275, 1106, 1000, // capped at RTO.Min
        ];

        for (i, e) in exp.iter().enumerate() {
            m.set_new_rtt(600);
            let rto = m.get_rto();
            assert_eq!(rto, *e, "should be equal: {i}");
        }
    }

    #[test]
    fn test_rto_manager_rto_calculation_large_rtt() {
        let mut m = RtoManager::new(&TimerConfig::default());
        let exp = [
            60000, // capped at RTO.Max
            60000, // capped at RTO.Max
            60000, // capped at RTO.Max
            55312, 48984,
        ];

        for (i, e) in exp.iter().enumerate() {
            m.set_new_rtt(30000);
            let rto = m.get_rto();
            assert_eq!(rto, *e, "should be equal: {i}");
        }
    }

    #[test]
    fn test_rto_manager_reset() {
        let mut m = RtoManager::new(&TimerConfig::default());
        for _ in 0..10 {
            m.set_new_rtt(200);
        }

        m.reset(&TimerConfig::default());
        assert_eq!(m.get_rto(), RTO_INITIAL);
        assert_eq!(m.srtt, 0);
        assert_eq!(m.rttvar, 0.0);
    }

    #[test]
    fn test_calculate_next_timeout() {
        assert_eq!(calculate_next_timeout(1, 0, RTO_MAX), 1);
        assert_eq!(calculate_next_timeout(1, 1, RTO_MAX), 2);
        assert_eq!(calculate_next_timeout(1, 2, RTO_MAX), 4);
        assert_eq!(calculate_next_timeout(1, 30, RTO_MAX), 60000);
        assert_eq!(calculate_next_timeout(1, 63, RTO_MAX), 60000);
        assert_eq!(calculate_next_timeout(1, 64, RTO_MAX), 60000);
    }

    #[test]
    fn test_timer_table_start_only_when_stopped() {
        let now = Instant::now();
        let mut t = TimerTable::new(&TimerConfig::default());
        assert!(t.start(Timer::T3RTX, now, 1000));
        assert!(!t.start(Timer::T3RTX, now + Duration::from_millis(500), 1000));
        assert_eq!(t.next_timeout(), Some(now + Duration::from_millis(1000)));

        assert!(!t.is_expired(Timer::T3RTX, now + Duration::from_millis(999)));
        assert!(t.is_expired(Timer::T3RTX, now + Duration::from_millis(1000)));

        t.stop(Timer::T3RTX);
        assert!(!t.is_running(Timer::T3RTX));
        assert_eq!(t.next_timeout(), None);
    }

    #[test]
    fn test_timer_table_backoff_and_limit() {
        let now = Instant::now();
        let config = TimerConfig {
            max_init_retransmits: Some(2),
            ..Default::default()
        };
        let mut t = TimerTable::new(&config);

        t.start(Timer::T1Init, now, 1000);
        assert!(t.on_expired(Timer::T1Init));
        t.restart_capped(Timer::T1Init, now, 1000, RTO_MAX);
        assert_eq!(t.next_timeout(), Some(now + Duration::from_millis(2000)));

        assert!(t.on_expired(Timer::T1Init));
        t.restart_capped(Timer::T1Init, now, 1000, RTO_MAX);
        assert_eq!(t.next_timeout(), Some(now + Duration::from_millis(4000)));

        assert!(!t.on_expired(Timer::T1Init), "third expiry exceeds the limit");
        assert_eq!(t.retrans(Timer::T1Init), 3);

        // data timers retry forever by default
        for _ in 0..100 {
            assert!(t.on_expired(Timer::T3RTX));
        }
    }

    #[test]
    fn test_ack_timer_has_no_backoff() {
        let now = Instant::now();
        let mut t = TimerTable::new(&TimerConfig::default());
        t.start(Timer::Ack, now, ACK_INTERVAL);
        t.on_expired(Timer::Ack);
        t.restart(Timer::Ack, now, ACK_INTERVAL);
        assert_eq!(
            t.next_timeout(),
            Some(now + Duration::from_millis(ACK_INTERVAL))
        );
    }
}
