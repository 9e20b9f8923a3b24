use std::time::Duration;

/// Blocking wait used for settle delays.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration);
    }
}

impl<D: Delay + ?Sized> Delay for Box<D> {
    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn thread_delay_sleeps_at_least_the_duration() {
        let start = Instant::now();
        ThreadDelay.delay(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn boxed_delay_forwards() {
        struct Count(u32);
        impl Delay for Count {
            fn delay(&mut self, _duration: Duration) {
                self.0 += 1;
            }
        }

        let mut count = Count(0);
        {
            let mut boxed: Box<dyn Delay + '_> = Box::new(&mut count);
            boxed.delay(Duration::ZERO);
            boxed.delay(Duration::ZERO);
        }
        assert_eq!(count.0, 2);
    }
}
